use base64::engine::general_purpose;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;

use edgesub::builders::{ClashBuilder, ClashMetaBuilder, LinkEncoder, SingBoxBuilder};
use edgesub::model::{ProxyEndpoint, ProxyHostRecord, UserSnapshot, UserStatus};
use edgesub::server_config::XrayConfig;
use edgesub::template::{MiniJinjaRenderer, TemplateSet};
use edgesub::{select_format, ClientFormat, HostResolver, Settings};

fn user(status: UserStatus) -> UserSnapshot {
  UserSnapshot {
    short_uuid: "u1".to_string(),
    username: "bob".to_string(),
    status,
    expire_at: Utc.with_ymd_and_hms(2031, 6, 1, 0, 0, 0).unwrap(),
    used_traffic_bytes: 0,
    traffic_limit_bytes: 0,
    trojan_password: "tp".to_string(),
    vless_uuid: "11111111-2222-3333-4444-555555555555".to_string(),
    ss_password: "sp".to_string(),
  }
}

fn host(remark: &str, address: &str, tag: &str) -> ProxyHostRecord {
  ProxyHostRecord {
    remark: remark.to_string(),
    address: address.to_string(),
    port: 443,
    inbound_tag: tag.to_string(),
    ..ProxyHostRecord::default()
  }
}

fn config() -> XrayConfig {
  serde_json::from_value(json!({
    "inbounds": [
      {
        "tag": "vless-ws",
        "protocol": "vless",
        "streamSettings": {
          "network": "ws",
          "security": "tls",
          "wsSettings": { "path": "/ws?ed=2560/", "headers": { "Host": "cdn.example.com" } },
          "tlsSettings": {}
        }
      },
      {
        "tag": "vless-kcp",
        "protocol": "vless",
        "streamSettings": { "network": "kcp", "security": "none" }
      },
      {
        "tag": "vless-reality",
        "protocol": "vless",
        "streamSettings": {
          "network": "tcp",
          "security": "reality",
          "realitySettings": {
            "serverNames": ["www.example.org"],
            "shortIds": ["a", "b"],
            "publicKey": "PBK"
          }
        }
      },
      {
        "tag": "trojan-tcp",
        "protocol": "trojan",
        "streamSettings": { "network": "tcp", "security": "tls" }
      }
    ]
  }))
  .unwrap()
}

fn resolve(hosts: &[ProxyHostRecord]) -> Vec<ProxyEndpoint> {
  HostResolver::with_seed(7).resolve(hosts, &config(), &user(UserStatus::Active), &Settings::default())
}

#[test]
fn format_selection_order() {
  assert_eq!(select_format("clash-meta/1.2"), ClientFormat::ClashMeta);
  assert_eq!(select_format("ClashX/1.95"), ClientFormat::Clash);
  assert_eq!(select_format("Stash/2.0"), ClientFormat::Stash);
  assert_eq!(select_format("sing-box 1.9"), ClientFormat::SingBox);
  assert_eq!(select_format("unknown-app/1.0"), ClientFormat::Xray);
  assert_eq!(select_format(""), ClientFormat::Xray);
  assert!(ClientFormat::Xray.base64_whole());
  assert!(!ClientFormat::ClashMeta.base64_whole());
}

#[test]
fn inactive_user_gets_exactly_the_configured_placeholders() {
  let settings = Settings {
    expired_user_remarks: vec!["A".to_string(), "B".to_string()],
    ..Settings::default()
  };
  let hosts = vec![
    host("one", "one.example.com", "trojan-tcp"),
    host("two", "two.example.com", "trojan-tcp"),
    host("three", "three.example.com", "vless-ws"),
  ];
  let eps = HostResolver::new().resolve(&hosts, &config(), &user(UserStatus::Expired), &settings);
  assert_eq!(eps.len(), 2);
  assert_eq!(eps[0].remark, "A");
  assert_eq!(eps[1].remark, "B");
  for ep in &eps {
    assert_eq!(ep.address, "0.0.0.0");
    assert_eq!(ep.port, 0);
  }
}

#[test]
fn sni_falls_back_to_domain_addresses_only() {
  let eps = resolve(&[
    host("dom", "example.com", "trojan-tcp"),
    host("ip", "1.2.3.4", "trojan-tcp"),
  ]);
  assert_eq!(eps[0].sni, "example.com");
  assert_eq!(eps[1].sni, "");
}

#[test]
fn early_data_reaches_every_ecosystem_that_models_it() {
  let eps = resolve(&[host("W", "w.example.com", "vless-ws")]);
  assert_eq!(eps.len(), 1);

  let renderer = MiniJinjaRenderer::new();
  let templates = TemplateSet::default();
  let yaml = ClashMetaBuilder::new(&renderer, &templates).build(&eps).unwrap();
  let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
  let ws = &doc["proxies"][0]["ws-opts"];
  assert_eq!(ws["path"].as_str(), Some("/ws"));
  assert_eq!(ws["max-early-data"].as_u64(), Some(2560));
  assert_eq!(ws["early-data-header-name"].as_str(), Some("Sec-WebSocket-Protocol"));
  assert_eq!(ws["headers"]["Host"].as_str(), Some("cdn.example.com"));

  let json_text = SingBoxBuilder::new(&templates.singbox).build(&eps).unwrap();
  let cfg: JsonValue = serde_json::from_str(&json_text).unwrap();
  let outbound = cfg["outbounds"]
    .as_array()
    .unwrap()
    .iter()
    .find(|o| o["tag"] == "W")
    .unwrap();
  assert_eq!(outbound["transport"]["path"], "/ws");
  assert_eq!(outbound["transport"]["max_early_data"], 2560);
  assert_eq!(outbound["transport"]["early_data_header_name"], "Sec-WebSocket-Protocol");
}

#[test]
fn link_output_is_deterministic_and_decodes() {
  let eps = resolve(&[
    host("W", "w.example.com", "vless-ws"),
    host("T", "t.example.com", "trojan-tcp"),
  ]);
  let encoder = LinkEncoder::new(true);
  let first = encoder.build(&eps).unwrap();
  assert_eq!(first, encoder.build(&eps).unwrap());
  let decoded = String::from_utf8(general_purpose::STANDARD.decode(&first).unwrap()).unwrap();
  assert_eq!(decoded, LinkEncoder::new(false).build(&eps).unwrap());
}

#[test]
fn kcp_only_survives_as_a_link() {
  let eps = resolve(&[host("K", "k.example.com", "vless-kcp")]);
  assert_eq!(eps.len(), 1);

  let links = LinkEncoder::new(false).build(&eps).unwrap();
  assert!(links.contains("type=kcp"));
  assert!(!links.contains("path="));

  let renderer = MiniJinjaRenderer::new();
  let templates = TemplateSet::default();
  for yaml in [
    ClashBuilder::new(&renderer, &templates, false).build(&eps).unwrap(),
    ClashBuilder::new(&renderer, &templates, true).build(&eps).unwrap(),
    ClashMetaBuilder::new(&renderer, &templates).build(&eps).unwrap(),
  ] {
    let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    let proxies = doc["proxies"].as_sequence().map(|s| s.len()).unwrap_or(0);
    assert_eq!(proxies, 0);
  }

  let cfg: JsonValue =
    serde_json::from_str(&SingBoxBuilder::new(&templates.singbox).build(&eps).unwrap()).unwrap();
  assert!(cfg["outbounds"].as_array().unwrap().iter().all(|o| o["tag"] != "K"));
}

#[test]
fn reality_short_ids_stay_in_set_and_both_appear() {
  let hosts = vec![host("R", "r.example.com", "vless-reality")];
  let cfg = config();
  let settings = Settings::default();
  let active = user(UserStatus::Active);
  let mut seen = HashSet::new();
  for seed in 0..200u64 {
    let eps = HostResolver::with_seed(seed).resolve(&hosts, &cfg, &active, &settings);
    let reality = eps[0].reality.as_ref().unwrap();
    assert_eq!(reality.public_key, "PBK");
    assert!(reality.short_id == "a" || reality.short_id == "b");
    seen.insert(reality.short_id.clone());
  }
  assert_eq!(seen.len(), 2);
}
