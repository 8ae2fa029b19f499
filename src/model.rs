//! Request-scoped data: host records and the user entity coming in, and the
//! normalized [`ProxyEndpoint`] every ecosystem builder consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
  Vless,
  Trojan,
  Shadowsocks,
}

impl Protocol {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "vless" => Some(Self::Vless),
      "trojan" => Some(Self::Trojan),
      "shadowsocks" | "ss" => Some(Self::Shadowsocks),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Vless => "vless",
      Self::Trojan => "trojan",
      Self::Shadowsocks => "shadowsocks",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
  Tcp,
  Raw,
  Ws,
  Grpc,
  H2,
  H3,
  HttpUpgrade,
  Xhttp,
  Kcp,
  Quic,
}

impl Network {
  /// Accepts Xray's aliases: `http` is HTTP/2, `splithttp` is the old name of XHTTP.
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "" | "tcp" => Some(Self::Tcp),
      "raw" => Some(Self::Raw),
      "ws" | "websocket" => Some(Self::Ws),
      "grpc" | "gun" => Some(Self::Grpc),
      "h2" | "http" => Some(Self::H2),
      "h3" => Some(Self::H3),
      "httpupgrade" => Some(Self::HttpUpgrade),
      "xhttp" | "splithttp" => Some(Self::Xhttp),
      "kcp" | "mkcp" => Some(Self::Kcp),
      "quic" => Some(Self::Quic),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Tcp => "tcp",
      Self::Raw => "raw",
      Self::Ws => "ws",
      Self::Grpc => "grpc",
      Self::H2 => "h2",
      Self::H3 => "h3",
      Self::HttpUpgrade => "httpupgrade",
      Self::Xhttp => "xhttp",
      Self::Kcp => "kcp",
      Self::Quic => "quic",
    }
  }
}

/// Transport security. `Unset` is the inbound that never declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
  None,
  Tls,
  Reality,
  #[serde(rename = "")]
  Unset,
}

impl Security {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "" => Some(Self::Unset),
      "none" => Some(Self::None),
      "tls" => Some(Self::Tls),
      "reality" => Some(Self::Reality),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Tls => "tls",
      Self::Reality => "reality",
      Self::Unset => "",
    }
  }

  pub fn is_secure(self) -> bool {
    matches!(self, Self::Tls | Self::Reality)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLayer {
  #[default]
  Default,
  Tls,
  None,
}

/// Admin-managed, user-facing endpoint pointing at one inbound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyHostRecord {
  pub remark: String,
  pub address: String,
  pub port: u16,
  pub inbound_tag: String,
  pub path: Option<String>,
  pub host: Option<String>,
  pub sni: Option<String>,
  pub alpn: Option<String>,
  pub fingerprint: Option<String>,
  pub security_layer: SecurityLayer,
  pub allow_insecure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
  Active,
  Disabled,
  Limited,
  Expired,
}

impl UserStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "ACTIVE",
      Self::Disabled => "DISABLED",
      Self::Limited => "LIMITED",
      Self::Expired => "EXPIRED",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
  pub short_uuid: String,
  pub username: String,
  pub status: UserStatus,
  pub expire_at: DateTime<Utc>,
  #[serde(default)]
  pub used_traffic_bytes: u64,
  /// Zero means unlimited.
  #[serde(default)]
  pub traffic_limit_bytes: u64,
  pub trojan_password: String,
  pub vless_uuid: String,
  pub ss_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
  pub trojan_password: String,
  pub vless_uuid: String,
  pub ss_password: String,
}

impl Credentials {
  pub fn of(user: &UserSnapshot) -> Self {
    Self {
      trojan_password: user.trojan_password.clone(),
      vless_uuid: user.vless_uuid.clone(),
      ss_password: user.ss_password.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealityParams {
  pub public_key: String,
  pub short_id: String,
  pub spider_x: String,
}

/// XHTTP size/interval knobs accept either a number or an Xray range string ("100-1000").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeValue {
  Number(u64),
  Range(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XhttpExtra {
  pub sc_max_each_post_bytes: RangeValue,
  pub sc_max_concurrent_posts: RangeValue,
  pub sc_min_posts_interval_ms: RangeValue,
  pub x_padding_bytes: RangeValue,
  #[serde(rename = "noGRPCHeader")]
  pub no_grpc_header: bool,
  #[serde(skip)]
  pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdditionalParams {
  pub xhttp: Option<XhttpExtra>,
  pub heartbeat_period: Option<u64>,
}

/// One user-facing proxy, fully resolved. Canonical input to every builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyEndpoint {
  pub remark: String,
  pub address: String,
  pub port: u16,
  pub protocol: Protocol,
  pub network: Network,
  pub path: String,
  pub host: String,
  pub tls: Security,
  pub sni: String,
  pub fingerprint: String,
  pub alpn: String,
  pub allow_insecure: bool,
  /// Set only when `tls` is [`Security::Reality`].
  pub reality: Option<RealityParams>,
  pub credentials: Credentials,
  pub ss_method: String,
  pub header_type: String,
  pub additional_params: AdditionalParams,
}

impl ProxyEndpoint {
  pub fn alpn_list(&self) -> Vec<String> {
    self
      .alpn
      .split(',')
      .map(|s| s.trim())
      .filter(|s| !s.is_empty())
      .map(|s| s.to_string())
      .collect()
  }

  /// Address as it goes into a URI authority (IPv6 literals bracketed).
  pub fn authority_host(&self) -> String {
    if self.address.contains(':') && !self.address.starts_with('[') {
      format!("[{}]", self.address)
    } else {
      self.address.clone()
    }
  }
}
