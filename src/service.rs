//! One request end to end, from host records to the response envelope.

use serde::Deserialize;
use tracing::info;

use crate::builders::{
  fail_soft, ClashBuilder, ClashMetaBuilder, LinkEncoder, OutlineBuilder, SingBoxBuilder,
};
use crate::envelope::{SubscriptionResponse, OUTLINE_CONTENT_TYPE};
use crate::error::TemplateError;
use crate::format::{select_format, singbox_version, ClientFormat};
use crate::model::{ProxyEndpoint, ProxyHostRecord, UserSnapshot};
use crate::resolver::HostResolver;
use crate::server_config::XrayConfig;
use crate::settings::Settings;
use crate::template::{MiniJinjaRenderer, TemplateRenderer, TemplateSet};

/// One subscription request as read from a request document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub user_agent: String,
  /// Explicit client type; bypasses user-agent detection when recognised.
  #[serde(default)]
  pub client: Option<String>,
  pub user: UserSnapshot,
  #[serde(default)]
  pub hosts: Vec<ProxyHostRecord>,
  #[serde(default)]
  pub xray_config: XrayConfig,
}

impl SubscriptionRequest {
  pub fn format(&self) -> ClientFormat {
    self
      .client
      .as_deref()
      .and_then(ClientFormat::from_client_type)
      .unwrap_or_else(|| select_format(&self.user_agent))
  }
}

pub struct SubscriptionService<R = MiniJinjaRenderer> {
  settings: Settings,
  templates: TemplateSet,
  renderer: R,
}

impl SubscriptionService<MiniJinjaRenderer> {
  /// Templates come from `settings.templates_dir` when set.
  pub fn new(settings: Settings) -> Result<Self, TemplateError> {
    let templates = TemplateSet::load(settings.templates_dir.as_deref())?;
    Ok(Self::with_parts(settings, templates, MiniJinjaRenderer::new()))
  }
}

impl<R: TemplateRenderer> SubscriptionService<R> {
  pub fn with_parts(settings: Settings, templates: TemplateSet, renderer: R) -> Self {
    Self {
      settings,
      templates,
      renderer,
    }
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn generate(&self, request: &SubscriptionRequest) -> SubscriptionResponse {
    self.generate_with(&mut HostResolver::new(), request)
  }

  pub fn generate_with(
    &self,
    resolver: &mut HostResolver,
    request: &SubscriptionRequest,
  ) -> SubscriptionResponse {
    let endpoints = self.resolve(resolver, request);
    let format = request.format();
    let body = self.build(format, &request.user_agent, &endpoints);
    info!(
      user = %request.user.short_uuid,
      format = format.as_str(),
      endpoints = endpoints.len(),
      bytes = body.len(),
      "subscription generated"
    );
    SubscriptionResponse::new(body, format.content_type(), &request.user, &self.settings)
  }

  pub fn outline(&self, request: &SubscriptionRequest, encoded_tag: &str) -> SubscriptionResponse {
    self.outline_with(&mut HostResolver::new(), request, encoded_tag)
  }

  pub fn outline_with(
    &self,
    resolver: &mut HostResolver,
    request: &SubscriptionRequest,
    encoded_tag: &str,
  ) -> SubscriptionResponse {
    let endpoints = self.resolve(resolver, request);
    let body = fail_soft("outline", OutlineBuilder::new(encoded_tag).build(&endpoints));
    info!(user = %request.user.short_uuid, bytes = body.len(), "outline config generated");
    SubscriptionResponse::new(body, OUTLINE_CONTENT_TYPE, &request.user, &self.settings)
  }

  fn resolve(&self, resolver: &mut HostResolver, request: &SubscriptionRequest) -> Vec<ProxyEndpoint> {
    resolver.resolve(&request.hosts, &request.xray_config, &request.user, &self.settings)
  }

  fn build(&self, format: ClientFormat, user_agent: &str, endpoints: &[ProxyEndpoint]) -> String {
    let mux = self.settings.mux_enabled;
    match format {
      ClientFormat::Xray => fail_soft(
        "xray",
        LinkEncoder::new(format.base64_whole()).build(endpoints),
      ),
      ClientFormat::Clash | ClientFormat::Stash => fail_soft(
        format.as_str(),
        ClashBuilder::new(&self.renderer, &self.templates, format == ClientFormat::Stash)
          .mux(mux)
          .build(endpoints),
      ),
      ClientFormat::ClashMeta => fail_soft(
        "clash-meta",
        ClashMetaBuilder::new(&self.renderer, &self.templates)
          .mux(mux)
          .build(endpoints),
      ),
      ClientFormat::SingBox => fail_soft(
        "sing-box",
        SingBoxBuilder::new(&self.templates.singbox)
          .client_version(singbox_version(user_agent))
          .build(endpoints),
      ),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use base64::engine::general_purpose;
  use base64::Engine;
  use chrono::{Duration, Utc};
  use serde_json::json;

  fn request(user_agent: &str, status: &str) -> SubscriptionRequest {
    serde_json::from_value(json!({
      "id": "r1",
      "userAgent": user_agent,
      "user": {
        "shortUuid": "abc",
        "username": "alice",
        "status": status,
        "expireAt": (Utc::now() + Duration::days(10)).to_rfc3339(),
        "usedTrafficBytes": 0,
        "trafficLimitBytes": 0,
        "trojanPassword": "tp",
        "vlessUuid": "11111111-2222-3333-4444-555555555555",
        "ssPassword": "sp"
      },
      "hosts": [
        { "remark": "T", "address": "t.example.com", "port": 443, "inboundTag": "trojan-ws" },
        { "remark": "S", "address": "s.example.com", "port": 8388, "inboundTag": "ss" }
      ],
      "xrayConfig": {
        "inbounds": [
          {
            "tag": "trojan-ws",
            "protocol": "trojan",
            "settings": {},
            "streamSettings": {
              "network": "ws",
              "security": "tls",
              "wsSettings": { "path": "/ws" },
              "tlsSettings": { "serverName": "t.example.com" }
            }
          },
          {
            "tag": "ss",
            "protocol": "shadowsocks",
            "settings": { "method": "aes-128-gcm" },
            "streamSettings": { "network": "tcp" }
          }
        ]
      }
    }))
    .unwrap()
  }

  fn service() -> SubscriptionService {
    SubscriptionService::new(Settings::default()).unwrap()
  }

  #[test]
  fn test_xray_body_is_base64_links() {
    let resp = service().generate(&request("v2rayNG/1.8", "active"));
    assert_eq!(resp.content_type, "text/plain; charset=utf-8");
    let decoded = general_purpose::STANDARD.decode(&resp.body).unwrap();
    let text = String::from_utf8(decoded).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("trojan://tp@t.example.com:443?"));
    assert!(lines[1].starts_with("ss://"));
  }

  #[test]
  fn test_client_override_beats_user_agent() {
    let mut req = request("clash-verge/1.0", "active");
    req.client = Some("singbox".to_string());
    assert_eq!(req.format(), ClientFormat::SingBox);
    req.client = Some("unknown".to_string());
    assert_eq!(req.format(), ClientFormat::ClashMeta);
  }

  #[test]
  fn test_clash_meta_yaml() {
    let resp = service().generate(&request("mihomo/1.18", "active"));
    assert_eq!(resp.content_type, "text/yaml; charset=utf-8");
    let doc: serde_yaml::Value = serde_yaml::from_str(&resp.body).unwrap();
    let proxies = doc["proxies"].as_sequence().unwrap();
    assert_eq!(proxies.len(), 2);
    assert_eq!(proxies[1]["type"].as_str(), Some("ss"));
    assert_eq!(proxies[1]["cipher"].as_str(), Some("aes-128-gcm"));
  }

  #[test]
  fn test_singbox_json() {
    let resp = service().generate(&request("SFA/1.10.3", "active"));
    assert_eq!(resp.content_type, "application/json");
    let cfg: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
    let tags: Vec<&str> = cfg["outbounds"]
      .as_array()
      .unwrap()
      .iter()
      .filter_map(|o| o["tag"].as_str())
      .collect();
    assert!(tags.contains(&"T") && tags.contains(&"S"));
  }

  #[test]
  fn test_outline_path() {
    let svc = service();
    let req = request("", "active");
    let resp = svc.outline(&req, &general_purpose::STANDARD.encode("S"));
    assert_eq!(resp.content_type, "application/json");
    let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(v["server_port"], 8388);
    assert_eq!(v["method"], "aes-128-gcm");
    assert_eq!(svc.outline(&req, &general_purpose::STANDARD.encode("T")).body, "{}");
  }

  #[test]
  fn test_inactive_user_gets_placeholders() {
    let resp = service().generate(&request("", "expired"));
    let text = String::from_utf8(general_purpose::STANDARD.decode(&resp.body).unwrap()).unwrap();
    assert_eq!(text.lines().count(), Settings::default().expired_user_remarks.len());
    assert!(text.lines().all(|l| l.starts_with("trojan://00000@0.0.0.0:0?")));
  }

  #[test]
  fn test_broken_template_fails_soft() {
    let templates = TemplateSet {
      clash_meta: "{{ unclosed".to_string(),
      ..TemplateSet::default()
    };
    let svc = SubscriptionService::with_parts(Settings::default(), templates, MiniJinjaRenderer::new());
    let resp = svc.generate(&request("mihomo", "active"));
    assert!(resp.is_empty());
    assert_eq!(resp.header("content-disposition"), Some("attachment; filename=\"alice\""));
  }
}
