//! Clash, Stash and Clash-Meta (mihomo) proxy nodes rendered through a
//! user-supplied YAML template.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::BuildError;
use crate::model::{Protocol, ProxyEndpoint, Security};
use crate::template::{TemplateRenderer, TemplateSet};
use crate::transport::{parse_early_data, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClashDialect {
  /// Classic Clash and Stash.
  Classic,
  Meta,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealityOpts {
  #[serde(rename = "public-key")]
  pub public_key: String,
  #[serde(rename = "short-id")]
  pub short_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Smux {
  pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WsOpts {
  pub path: String,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_early_data: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub early_data_header_name: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub v2ray_http_upgrade: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpOpts {
  pub method: &'static str,
  pub path: Vec<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct H2Opts {
  pub path: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub host: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrpcOpts {
  #[serde(rename = "grpc-service-name")]
  pub grpc_service_name: String,
}

/// Per-network option block; serialized as a single `<kind>-opts` key.
#[derive(Debug, Clone, Serialize)]
pub enum NetworkOpts {
  #[serde(rename = "ws-opts")]
  Ws(WsOpts),
  #[serde(rename = "http-opts")]
  Http(HttpOpts),
  #[serde(rename = "h2-opts")]
  H2(H2Opts),
  #[serde(rename = "grpc-opts")]
  Grpc(GrpcOpts),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClashProxy {
  pub name: String,
  #[serde(rename = "type")]
  pub proxy_type: &'static str,
  pub server: String,
  pub port: u16,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub network: Option<&'static str>,
  pub udp: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub uuid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cipher: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flow: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tls: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub servername: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sni: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alpn: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skip_cert_verify: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client_fingerprint: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reality_opts: Option<RealityOpts>,
  #[serde(flatten)]
  pub opts: Option<NetworkOpts>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub smux: Option<Smux>,
}

#[derive(Serialize)]
struct TemplateVars<'a> {
  proxies: &'a [ClashProxy],
  proxy_remarks: &'a [String],
}

fn some_non_empty(s: &str) -> Option<String> {
  (!s.is_empty()).then(|| s.to_string())
}

fn host_header(host: &str) -> BTreeMap<String, String> {
  let mut headers = BTreeMap::new();
  if !host.is_empty() {
    headers.insert("Host".to_string(), host.to_string());
  }
  headers
}

fn ws_opts(path: &str, host: &str, http_upgrade: bool) -> WsOpts {
  let ed = parse_early_data(path);
  WsOpts {
    headers: host_header(host),
    max_early_data: ed.max_early_data,
    early_data_header_name: ed.header_name(),
    path: ed.path,
    v2ray_http_upgrade: http_upgrade.then_some(true),
  }
}

/// Network name and option block, or `None` when the dialect cannot express
/// the transport and the endpoint must be dropped.
fn network_opts(
  transport: Transport<'_>,
  dialect: ClashDialect,
) -> Option<(&'static str, Option<NetworkOpts>)> {
  match transport {
    Transport::Tcp {
      http_disguise: true,
      path,
      host,
    } => {
      let mut headers = BTreeMap::new();
      if !host.is_empty() {
        headers.insert("Host".to_string(), vec![host.to_string()]);
      }
      let path = if path.is_empty() { "/" } else { path };
      Some((
        "http",
        Some(NetworkOpts::Http(HttpOpts {
          method: "GET",
          path: vec![path.to_string()],
          headers,
        })),
      ))
    }
    Transport::Tcp { .. } => Some(("tcp", None)),
    Transport::Ws { path, host, .. } => Some(("ws", Some(NetworkOpts::Ws(ws_opts(path, host, false))))),
    Transport::HttpUpgrade { path, host } => match dialect {
      ClashDialect::Meta => Some(("ws", Some(NetworkOpts::Ws(ws_opts(path, host, true))))),
      ClashDialect::Classic => None,
    },
    Transport::Grpc { service_name, .. } => Some((
      "grpc",
      Some(NetworkOpts::Grpc(GrpcOpts {
        grpc_service_name: service_name.to_string(),
      })),
    )),
    Transport::H2 { path, host } => Some((
      "h2",
      Some(NetworkOpts::H2(H2Opts {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        host: some_non_empty(host).into_iter().collect(),
      })),
    )),
    Transport::Xhttp { .. } | Transport::H3 | Transport::Kcp | Transport::Quic => None,
  }
}

pub fn proxy_node(ep: &ProxyEndpoint, dialect: ClashDialect, mux_enabled: bool) -> Option<ClashProxy> {
  let transport = Transport::of(ep);
  let (network, opts) = match ep.protocol {
    Protocol::Shadowsocks => (None, None),
    Protocol::Vless | Protocol::Trojan => {
      let (network, opts) = network_opts(transport, dialect)?;
      (Some(network), opts)
    }
  };

  let mut node = ClashProxy {
    name: ep.remark.clone(),
    proxy_type: match ep.protocol {
      Protocol::Vless => "vless",
      Protocol::Trojan => "trojan",
      Protocol::Shadowsocks => "ss",
    },
    server: ep.address.clone(),
    port: ep.port,
    network,
    udp: true,
    uuid: None,
    password: None,
    cipher: None,
    flow: None,
    tls: None,
    servername: None,
    sni: None,
    alpn: None,
    skip_cert_verify: None,
    client_fingerprint: None,
    reality_opts: None,
    opts,
    smux: mux_enabled.then_some(Smux { enabled: true }),
  };

  match ep.protocol {
    Protocol::Vless => node.uuid = Some(ep.credentials.vless_uuid.clone()),
    Protocol::Trojan => node.password = Some(ep.credentials.trojan_password.clone()),
    Protocol::Shadowsocks => {
      node.cipher = Some(ep.ss_method.clone());
      node.password = Some(ep.credentials.ss_password.clone());
      return Some(node);
    }
  }

  if ep.tls.is_secure() {
    node.tls = Some(true);
    let sni = some_non_empty(&ep.sni);
    if ep.protocol == Protocol::Trojan {
      node.sni = sni;
    } else {
      node.servername = sni;
    }
    let alpn = ep.alpn_list();
    node.alpn = (!alpn.is_empty()).then_some(alpn);
    node.skip_cert_verify = ep.allow_insecure.then_some(true);
    node.client_fingerprint = some_non_empty(&ep.fingerprint);
    if ep.protocol == Protocol::Vless && matches!(transport, Transport::Tcp { http_disguise: false, .. }) {
      node.flow = Some("xtls-rprx-vision");
    }
  }
  if ep.tls == Security::Reality {
    node.reality_opts = ep.reality.as_ref().map(|r| RealityOpts {
      public_key: r.public_key.clone(),
      short_id: r.short_id.clone(),
    });
  }
  Some(node)
}

fn render<R: TemplateRenderer>(
  renderer: &R,
  template: &str,
  endpoints: &[ProxyEndpoint],
  dialect: ClashDialect,
  mux_enabled: bool,
) -> Result<String, BuildError> {
  let proxies: Vec<ClashProxy> = endpoints
    .iter()
    .filter_map(|ep| {
      let node = proxy_node(ep, dialect, mux_enabled);
      if node.is_none() {
        debug!(remark = %ep.remark, network = ep.network.as_str(), ?dialect, "network unsupported, dropped");
      }
      node
    })
    .collect();
  let proxy_remarks: Vec<String> = proxies.iter().map(|p| p.name.clone()).collect();
  let vars = TemplateVars {
    proxies: &proxies,
    proxy_remarks: &proxy_remarks,
  };
  Ok(renderer.render(template, &vars)?)
}

/// Classic Clash, or Stash when `stash` is set. Both share one template
/// family; the flag picks the member.
pub struct ClashBuilder<'a, R> {
  renderer: &'a R,
  templates: &'a TemplateSet,
  stash: bool,
  mux_enabled: bool,
}

impl<'a, R: TemplateRenderer> ClashBuilder<'a, R> {
  pub fn new(renderer: &'a R, templates: &'a TemplateSet, stash: bool) -> Self {
    Self {
      renderer,
      templates,
      stash,
      mux_enabled: false,
    }
  }

  pub fn mux(mut self, enabled: bool) -> Self {
    self.mux_enabled = enabled;
    self
  }

  pub fn build(&self, endpoints: &[ProxyEndpoint]) -> Result<String, BuildError> {
    let template = if self.stash {
      &self.templates.stash
    } else {
      &self.templates.clash
    };
    render(
      self.renderer,
      template,
      endpoints,
      ClashDialect::Classic,
      self.mux_enabled,
    )
  }
}

pub struct ClashMetaBuilder<'a, R> {
  renderer: &'a R,
  templates: &'a TemplateSet,
  mux_enabled: bool,
}

impl<'a, R: TemplateRenderer> ClashMetaBuilder<'a, R> {
  pub fn new(renderer: &'a R, templates: &'a TemplateSet) -> Self {
    Self {
      renderer,
      templates,
      mux_enabled: false,
    }
  }

  pub fn mux(mut self, enabled: bool) -> Self {
    self.mux_enabled = enabled;
    self
  }

  pub fn build(&self, endpoints: &[ProxyEndpoint]) -> Result<String, BuildError> {
    render(
      self.renderer,
      &self.templates.clash_meta,
      endpoints,
      ClashDialect::Meta,
      self.mux_enabled,
    )
  }
}
