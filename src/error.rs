//! Error types for subscription generation.

use std::path::PathBuf;
use thiserror::Error;

/// Hard failures while merging host records with inbound settings.
///
/// Any of these aborts resolution for the whole request: the resolver
/// yields an empty endpoint list rather than a partial one.
#[derive(Error, Debug)]
pub enum ResolveError {
  #[error("inbound {tag}: malformed streamSettings: {source}")]
  StreamSettings {
    tag: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("inbound {tag}: unknown network {network:?}")]
  UnknownNetwork { tag: String, network: String },

  #[error("inbound {tag}: unknown security {security:?}")]
  UnknownSecurity { tag: String, security: String },

  #[error("inbound {tag}: reality inbound has no publicKey")]
  MissingRealityPublicKey { tag: String },
}

/// Failures inside an ecosystem builder. The pipeline never lets these
/// escape; see [`crate::builders::fail_soft`].
#[derive(Error, Debug)]
pub enum BuildError {
  #[error("template: {0}")]
  Template(#[from] TemplateError),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("sing-box template has no outbounds array")]
  MissingOutbounds,
}

#[derive(Error, Debug)]
pub enum TemplateError {
  #[error("read template {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("render failed: {0}")]
  Render(#[from] minijinja::Error),
}

#[derive(Error, Debug)]
pub enum SettingsError {
  #[error("read settings {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("parse settings: {0}")]
  Parse(#[from] serde_yaml::Error),
}
