//! Subscription generation for proxy edge nodes: turns a user's assigned
//! hosts into a ready-to-import config for Xray-family, Clash, Clash-Meta,
//! Stash, sing-box or Outline clients.

pub mod builders;
pub mod envelope;
pub mod error;
pub mod format;
pub mod model;
pub mod remark;
pub mod resolver;
pub mod server_config;
pub mod service;
pub mod settings;
pub mod template;
pub mod transport;

pub use envelope::SubscriptionResponse;
pub use format::{select_format, ClientFormat};
pub use resolver::HostResolver;
pub use service::{SubscriptionRequest, SubscriptionService};
pub use settings::Settings;
