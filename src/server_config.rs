//! Read-only, typed view of the Xray server config's inbounds.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::error::ResolveError;
use crate::model::RangeValue;

pub trait ServerConfig {
  fn inbound(&self, tag: &str) -> Option<&InboundDefinition>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayConfig {
  #[serde(default)]
  pub inbounds: Vec<InboundDefinition>,
}

impl XrayConfig {
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }
}

impl ServerConfig for XrayConfig {
  fn inbound(&self, tag: &str) -> Option<&InboundDefinition> {
    self.inbounds.iter().find(|i| i.tag == tag)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundDefinition {
  #[serde(default)]
  pub tag: String,
  #[serde(default)]
  pub protocol: String,
  #[serde(default)]
  pub settings: JsonValue,
  /// Kept raw until a host actually references this inbound.
  #[serde(default)]
  pub stream_settings: Option<JsonValue>,
}

impl InboundDefinition {
  pub fn stream(&self) -> Result<StreamSettings, ResolveError> {
    match &self.stream_settings {
      None | Some(JsonValue::Null) => Ok(StreamSettings::default()),
      Some(raw) => {
        StreamSettings::deserialize(raw).map_err(|source| ResolveError::StreamSettings {
          tag: self.tag.clone(),
          source,
        })
      }
    }
  }

  /// Shadowsocks cipher declared on the inbound, if any.
  pub fn ss_method(&self) -> Option<String> {
    let direct = self.settings.get("method").and_then(|v| v.as_str());
    let from_client = self
      .settings
      .get("clients")
      .and_then(|c| c.as_array())
      .and_then(|c| c.first())
      .and_then(|c| c.get("method"))
      .and_then(|v| v.as_str());
    direct
      .or(from_client)
      .map(|s| s.trim())
      .filter(|s| !s.is_empty())
      .map(|s| s.to_string())
  }
}

/// Xray accepts either a single string or a list in several header/host slots.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

impl OneOrMany {
  pub fn first(&self) -> Option<&str> {
    match self {
      Self::One(s) => Some(s.as_str()),
      Self::Many(v) => v.first().map(|s| s.as_str()),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
  pub network: Option<String>,
  pub security: Option<String>,
  pub tls_settings: Option<TlsSettings>,
  pub reality_settings: Option<RealitySettings>,
  pub ws_settings: Option<WsSettings>,
  pub xhttp_settings: Option<XhttpSettings>,
  pub splithttp_settings: Option<XhttpSettings>,
  pub tcp_settings: Option<TcpSettings>,
  pub raw_settings: Option<TcpSettings>,
  pub grpc_settings: Option<GrpcSettings>,
  pub http_settings: Option<HttpSettings>,
  pub httpupgrade_settings: Option<HttpUpgradeSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsSettings {
  pub server_name: Option<String>,
  pub alpn: Vec<String>,
  pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealitySettings {
  pub server_name: Option<String>,
  pub server_names: Vec<String>,
  pub short_ids: Vec<String>,
  pub public_key: Option<String>,
  pub fingerprint: Option<String>,
  pub spider_x: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WsSettings {
  pub path: Option<String>,
  pub host: Option<String>,
  pub headers: HashMap<String, String>,
  pub heartbeat_period: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XhttpExtraSettings {
  pub sc_max_each_post_bytes: Option<RangeValue>,
  pub sc_max_concurrent_posts: Option<RangeValue>,
  pub sc_min_posts_interval_ms: Option<RangeValue>,
  pub x_padding_bytes: Option<RangeValue>,
  #[serde(rename = "noGRPCHeader")]
  pub no_grpc_header: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XhttpSettings {
  pub path: Option<String>,
  pub host: Option<String>,
  pub mode: Option<String>,
  pub extra: Option<XhttpExtraSettings>,
  #[serde(flatten)]
  pub inline: XhttpExtraSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TcpSettings {
  pub header: Option<TcpHeader>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TcpHeader {
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub request: Option<TcpHeaderRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TcpHeaderRequest {
  pub path: Option<OneOrMany>,
  pub headers: HashMap<String, OneOrMany>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrpcSettings {
  pub service_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
  pub path: Option<String>,
  pub host: Option<OneOrMany>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpUpgradeSettings {
  pub path: Option<String>,
  pub host: Option<String>,
}
