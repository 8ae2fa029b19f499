//! sing-box JSON: outbounds appended to a loaded template, then group
//! membership recomputed for `urltest` and `selector` outbounds.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::BuildError;
use crate::model::{Protocol, ProxyEndpoint, Security};
use crate::transport::{parse_early_data, Transport};

const PROXY_TYPES: [&str; 3] = ["vless", "trojan", "shadowsocks"];
const REALITY_DEFAULT_FINGERPRINT: &str = "chrome";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum V2RayTransport {
  Ws {
    path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_early_data: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    early_data_header_name: Option<&'static str>,
  },
  Grpc {
    service_name: String,
  },
  Http {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    host: Vec<String>,
    path: String,
  },
  HttpUpgrade {
    #[serde(skip_serializing_if = "String::is_empty")]
    host: String,
    path: String,
  },
}

#[derive(Debug, Clone, Serialize)]
pub struct Utls {
  pub enabled: bool,
  pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reality {
  pub enabled: bool,
  pub public_key: String,
  pub short_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundTls {
  pub enabled: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub server_name: Option<String>,
  pub insecure: bool,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub alpn: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub utls: Option<Utls>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reality: Option<Reality>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outbound {
  #[serde(rename = "type")]
  pub kind: &'static str,
  pub tag: String,
  pub server: String,
  pub server_port: u16,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub uuid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flow: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub packet_encoding: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tls: Option<OutboundTls>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub transport: Option<V2RayTransport>,
}

fn v2ray_transport(transport: Transport<'_>) -> Option<Option<V2RayTransport>> {
  let host_vec = |host: &str| {
    if host.is_empty() {
      Vec::new()
    } else {
      vec![host.to_string()]
    }
  };
  match transport {
    Transport::Tcp {
      http_disguise: true,
      path,
      host,
    } => Some(Some(V2RayTransport::Http {
      host: host_vec(host),
      path: if path.is_empty() { "/".to_string() } else { path.to_string() },
    })),
    Transport::Tcp { .. } => Some(None),
    Transport::Ws { path, host, .. } => {
      let ed = parse_early_data(path);
      let mut headers = BTreeMap::new();
      if !host.is_empty() {
        headers.insert("Host".to_string(), host.to_string());
      }
      Some(Some(V2RayTransport::Ws {
        max_early_data: ed.max_early_data,
        early_data_header_name: ed.header_name(),
        path: ed.path,
        headers,
      }))
    }
    Transport::Grpc { service_name, .. } => Some(Some(V2RayTransport::Grpc {
      service_name: service_name.to_string(),
    })),
    Transport::H2 { path, host } => Some(Some(V2RayTransport::Http {
      host: host_vec(host),
      path: path.to_string(),
    })),
    Transport::HttpUpgrade { path, host } => Some(Some(V2RayTransport::HttpUpgrade {
      host: host.to_string(),
      path: path.to_string(),
    })),
    // No sing-box V2Ray transport speaks these; a bare outbound would dial raw tcp.
    Transport::Xhttp { .. } | Transport::H3 | Transport::Kcp | Transport::Quic => None,
  }
}

fn outbound_tls(ep: &ProxyEndpoint) -> Option<OutboundTls> {
  if !ep.tls.is_secure() {
    return None;
  }
  let reality = match (&ep.reality, ep.tls) {
    (Some(r), Security::Reality) => Some(Reality {
      enabled: true,
      public_key: r.public_key.clone(),
      short_id: r.short_id.clone(),
    }),
    _ => None,
  };
  let fingerprint = if ep.fingerprint.is_empty() && reality.is_some() {
    REALITY_DEFAULT_FINGERPRINT.to_string()
  } else {
    ep.fingerprint.clone()
  };
  Some(OutboundTls {
    enabled: true,
    server_name: (!ep.sni.is_empty()).then(|| ep.sni.clone()),
    insecure: ep.allow_insecure,
    alpn: ep.alpn_list(),
    utls: (!fingerprint.is_empty()).then_some(Utls {
      enabled: true,
      fingerprint,
    }),
    reality,
  })
}

/// `None` when sing-box has no counterpart for the endpoint's transport.
pub fn outbound(ep: &ProxyEndpoint) -> Option<Outbound> {
  let transport = Transport::of(ep);
  let mut out = Outbound {
    kind: ep.protocol.as_str(),
    tag: ep.remark.clone(),
    server: ep.address.clone(),
    server_port: ep.port,
    uuid: None,
    flow: None,
    packet_encoding: None,
    method: None,
    password: None,
    tls: None,
    transport: None,
  };
  match ep.protocol {
    Protocol::Shadowsocks => {
      out.method = Some(ep.ss_method.clone());
      out.password = Some(ep.credentials.ss_password.clone());
      return Some(out);
    }
    Protocol::Vless => {
      out.uuid = Some(ep.credentials.vless_uuid.clone());
      out.packet_encoding = Some("xudp");
      if ep.tls.is_secure() && matches!(transport, Transport::Tcp { http_disguise: false, .. }) {
        out.flow = Some("xtls-rprx-vision");
      }
    }
    Protocol::Trojan => out.password = Some(ep.credentials.trojan_password.clone()),
  }
  out.transport = v2ray_transport(transport)?;
  out.tls = outbound_tls(ep);
  Some(out)
}

fn tag_of(outbound: &JsonValue) -> Option<String> {
  outbound.get("tag").and_then(|t| t.as_str()).map(|t| t.to_string())
}

fn type_of(outbound: &JsonValue) -> &str {
  outbound.get("type").and_then(|t| t.as_str()).unwrap_or("")
}

/// urltest groups get every proxy tag; selectors get urltest tags then proxy tags.
fn assign_groups(outbounds: &mut [JsonValue]) {
  let proxy_tags: Vec<String> = outbounds
    .iter()
    .filter(|o| PROXY_TYPES.contains(&type_of(o)))
    .filter_map(tag_of)
    .collect();
  let urltest_tags: Vec<String> = outbounds
    .iter()
    .filter(|o| type_of(o) == "urltest")
    .filter_map(tag_of)
    .collect();
  let selector_members: Vec<String> = urltest_tags.iter().chain(proxy_tags.iter()).cloned().collect();

  for o in outbounds.iter_mut() {
    let members = match type_of(o) {
      "urltest" => &proxy_tags,
      "selector" => &selector_members,
      _ => continue,
    };
    if let Some(obj) = o.as_object_mut() {
      obj.insert(
        "outbounds".to_string(),
        JsonValue::Array(members.iter().cloned().map(JsonValue::String).collect()),
      );
    }
  }
}

fn to_pretty_json(value: &JsonValue) -> Result<String, BuildError> {
  let mut buf = Vec::new();
  let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
  let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
  value.serialize(&mut ser)?;
  Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub struct SingBoxBuilder<'a> {
  template: &'a str,
  client_version: Option<String>,
}

impl<'a> SingBoxBuilder<'a> {
  pub fn new(template: &'a str) -> Self {
    Self {
      template,
      client_version: None,
    }
  }

  /// Client version parsed from the user agent. Carried through but not yet
  /// used for template selection.
  pub fn client_version(mut self, version: Option<String>) -> Self {
    self.client_version = version;
    self
  }

  pub fn build(&self, endpoints: &[ProxyEndpoint]) -> Result<String, BuildError> {
    if let Some(version) = &self.client_version {
      debug!(version = %version, "sing-box client version");
    }
    let mut config: JsonValue = serde_json::from_str(self.template)?;
    let root: &mut Map<String, JsonValue> =
      config.as_object_mut().ok_or(BuildError::MissingOutbounds)?;
    let outbounds = root
      .get_mut("outbounds")
      .and_then(|o| o.as_array_mut())
      .ok_or(BuildError::MissingOutbounds)?;

    for ep in endpoints {
      match outbound(ep) {
        Some(o) => outbounds.push(serde_json::to_value(o)?),
        None => debug!(remark = %ep.remark, network = ep.network.as_str(), "network unsupported by sing-box, dropped"),
      }
    }
    assign_groups(outbounds);
    to_pretty_json(&config)
  }
}
