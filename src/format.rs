//! Picks the target ecosystem from the client's identification string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFormat {
  Xray,
  ClashMeta,
  Clash,
  Stash,
  SingBox,
}

impl ClientFormat {
  pub fn content_type(self) -> &'static str {
    match self {
      Self::Xray => "text/plain; charset=utf-8",
      Self::ClashMeta | Self::Clash | Self::Stash => "text/yaml; charset=utf-8",
      Self::SingBox => "application/json",
    }
  }

  /// Only raw links are base64-encoded as a whole body.
  pub fn base64_whole(self) -> bool {
    matches!(self, Self::Xray)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Xray => "XRAY",
      Self::ClashMeta => "CLASH_META",
      Self::Clash => "CLASH",
      Self::Stash => "STASH",
      Self::SingBox => "SING_BOX",
    }
  }

  /// Explicit client type from the request path, bypassing detection.
  pub fn from_client_type(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "xray" | "v2ray" | "links" => Some(Self::Xray),
      "clash" => Some(Self::Clash),
      "stash" => Some(Self::Stash),
      "mihomo" | "clash-meta" | "clash_meta" | "meta" => Some(Self::ClashMeta),
      "singbox" | "sing-box" | "sing_box" => Some(Self::SingBox),
      _ => None,
    }
  }
}

/// Tested in order; the first match wins. `Xray` is the fallback and never
/// appears here. `ClashMeta` must precede `Clash` since every meta client
/// string also starts with "clash".
static SIGNATURES: Lazy<Vec<(ClientFormat, Regex)>> = Lazy::new(|| {
  [
    (
      ClientFormat::ClashMeta,
      r"(?i)^(clash[-.]?meta|clash-verge|clashx[ .-]?meta|flclash|mihomo|clash-nyanpasu|clashmi|koala-clash)",
    ),
    (ClientFormat::Clash, r"(?i)^clash"),
    (ClientFormat::Stash, r"(?i)^stash"),
    (
      ClientFormat::SingBox,
      r"(?i)^(sfa|sfi|sfm|sft|sing-box|singbox|karing|hiddify)",
    ),
  ]
  .into_iter()
  .map(|(format, pattern)| (format, Regex::new(pattern).expect("client signature regex")))
  .collect()
});

static SINGBOX_VERSION: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)^(?:sfa|sfi|sfm|sft|sing-box|singbox)/(\d+\.\d+(?:\.\d+)?)")
    .expect("sing-box version regex")
});

pub fn select_format(user_agent: &str) -> ClientFormat {
  let ua = user_agent.trim();
  if ua.is_empty() {
    return ClientFormat::Xray;
  }
  SIGNATURES
    .iter()
    .find(|(_, re)| re.is_match(ua))
    .map(|(format, _)| *format)
    .unwrap_or(ClientFormat::Xray)
}

/// `SFA/1.10.3 (...)` -> `1.10.3`.
pub fn singbox_version(user_agent: &str) -> Option<String> {
  SINGBOX_VERSION
    .captures(user_agent.trim())
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_string())
}
