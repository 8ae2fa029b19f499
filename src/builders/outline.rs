//! Outline (Shadowsocks-only) access config, selected by a base64 tag.

use base64::engine::general_purpose;
use base64::Engine;
use serde::Serialize;
use tracing::debug;

use crate::error::BuildError;
use crate::model::{Protocol, ProxyEndpoint};

#[derive(Debug, Serialize)]
struct OutlineConfig<'a> {
  method: &'a str,
  password: &'a str,
  server: &'a str,
  server_port: u16,
  tag: &'a str,
}

/// Lenient decode: whitespace stripped, padding repaired, standard and
/// URL-safe alphabets both tried.
pub fn decode_base64_to_utf8(s: &str) -> Option<String> {
  let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
  if cleaned.is_empty() {
    return None;
  }
  let mut candidates = Vec::with_capacity(2);
  candidates.push(cleaned.clone());
  let rem = cleaned.len() % 4;
  if rem != 0 {
    candidates.push(format!("{cleaned}{}", "=".repeat(4 - rem)));
  }

  for cand in candidates {
    for engine in [&general_purpose::STANDARD, &general_purpose::URL_SAFE] {
      if let Ok(bytes) = engine.decode(&cand) {
        if let Ok(txt) = String::from_utf8(bytes) {
          return Some(txt);
        }
      }
    }
  }
  None
}

pub struct OutlineBuilder<'a> {
  encoded_tag: &'a str,
}

impl<'a> OutlineBuilder<'a> {
  pub fn new(encoded_tag: &'a str) -> Self {
    Self { encoded_tag }
  }

  /// `{}` when the tag does not decode or names no Shadowsocks endpoint.
  pub fn build(&self, endpoints: &[ProxyEndpoint]) -> Result<String, BuildError> {
    let Some(tag) = decode_base64_to_utf8(self.encoded_tag) else {
      debug!(tag = %self.encoded_tag, "outline tag did not decode");
      return Ok("{}".to_string());
    };
    let found = endpoints
      .iter()
      .find(|ep| ep.protocol == Protocol::Shadowsocks && ep.remark == tag);
    match found {
      Some(ep) => Ok(serde_json::to_string(&OutlineConfig {
        method: &ep.ss_method,
        password: &ep.credentials.ss_password,
        server: &ep.address,
        server_port: ep.port,
        tag: &ep.remark,
      })?),
      None => Ok("{}".to_string()),
    }
  }
}
