//! One builder per client ecosystem. Builders share only their input type
//! (`&[ProxyEndpoint]`) and never depend on each other.

use tracing::error;

use crate::error::BuildError;

pub mod clash;
pub mod links;
pub mod outline;
pub mod singbox;

pub use clash::{ClashBuilder, ClashMetaBuilder};
pub use links::LinkEncoder;
pub use outline::OutlineBuilder;
pub use singbox::SingBoxBuilder;

/// Builder boundary guard: a failed build becomes an empty body.
pub fn fail_soft(ecosystem: &str, result: Result<String, BuildError>) -> String {
  match result {
    Ok(body) => body,
    Err(e) => {
      error!(ecosystem, "subscription build failed: {e}");
      String::new()
    }
  }
}
