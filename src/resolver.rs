//! Merges user-assigned host records with their inbounds into [`ProxyEndpoint`]s.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::error::ResolveError;
use crate::model::{
  AdditionalParams, Credentials, Network, Protocol, ProxyEndpoint, ProxyHostRecord, RangeValue,
  RealityParams, Security, SecurityLayer, UserSnapshot, UserStatus, XhttpExtra,
};
use crate::remark::RemarkContext;
use crate::server_config::{InboundDefinition, ServerConfig, StreamSettings, XhttpExtraSettings};
use crate::settings::Settings;

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^(?:[A-Za-z0-9](?:-?[A-Za-z0-9])*\.)+[A-Za-z]{2,}$").expect("domain regex")
});

const PLACEHOLDER_ADDRESS: &str = "0.0.0.0";
const PLACEHOLDER_PASSWORD: &str = "00000";
const PLACEHOLDER_UUID: &str = "00000000-0000-0000-0000-000000000000";

pub fn is_domain_name(address: &str) -> bool {
  DOMAIN_RE.is_match(address)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
  s.map(|x| x.trim()).filter(|x| !x.is_empty())
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
  candidates
    .into_iter()
    .find_map(non_empty)
    .unwrap_or("")
    .to_string()
}

/// Transport fields pulled from the inbound, before host overrides.
#[derive(Debug, Default)]
struct InboundTransport {
  path: String,
  host: String,
  header_type: String,
  additional: AdditionalParams,
}

fn pick_range(
  inline: &XhttpExtraSettings,
  extra: Option<&XhttpExtraSettings>,
  field: impl Fn(&XhttpExtraSettings) -> Option<&RangeValue>,
  default: RangeValue,
) -> RangeValue {
  extra
    .and_then(&field)
    .or_else(|| field(inline))
    .cloned()
    .unwrap_or(default)
}

fn xhttp_extra(
  inline: &XhttpExtraSettings,
  extra: Option<&XhttpExtraSettings>,
  mode: Option<&str>,
) -> XhttpExtra {
  XhttpExtra {
    sc_max_each_post_bytes: pick_range(
      inline,
      extra,
      |s| s.sc_max_each_post_bytes.as_ref(),
      RangeValue::Number(1_000_000),
    ),
    sc_max_concurrent_posts: pick_range(
      inline,
      extra,
      |s| s.sc_max_concurrent_posts.as_ref(),
      RangeValue::Number(100),
    ),
    sc_min_posts_interval_ms: pick_range(
      inline,
      extra,
      |s| s.sc_min_posts_interval_ms.as_ref(),
      RangeValue::Number(30),
    ),
    x_padding_bytes: pick_range(
      inline,
      extra,
      |s| s.x_padding_bytes.as_ref(),
      RangeValue::Range("100-1000".to_string()),
    ),
    no_grpc_header: extra
      .and_then(|s| s.no_grpc_header)
      .or(inline.no_grpc_header)
      .unwrap_or(false),
    mode: non_empty(mode).unwrap_or("auto").to_string(),
  }
}

fn inbound_transport(network: Network, protocol: Protocol, stream: &StreamSettings) -> InboundTransport {
  let mut out = InboundTransport::default();
  match network {
    Network::Xhttp => {
      if let Some(x) = stream.xhttp_settings.as_ref().or(stream.splithttp_settings.as_ref()) {
        out.path = first_non_empty([x.path.as_deref()]);
        out.host = first_non_empty([x.host.as_deref()]);
        out.additional.xhttp = Some(xhttp_extra(&x.inline, x.extra.as_ref(), x.mode.as_deref()));
      } else {
        out.additional.xhttp = Some(xhttp_extra(&XhttpExtraSettings::default(), None, None));
      }
    }
    Network::Ws => {
      if let Some(ws) = &stream.ws_settings {
        out.path = first_non_empty([ws.path.as_deref()]);
        out.host = first_non_empty([
          ws.host.as_deref(),
          ws.headers.get("Host").map(|s| s.as_str()),
          ws.headers.get("host").map(|s| s.as_str()),
        ]);
        out.additional.heartbeat_period = ws.heartbeat_period.filter(|p| *p > 0);
      }
    }
    Network::Tcp | Network::Raw if protocol != Protocol::Shadowsocks => {
      let header = stream
        .raw_settings
        .as_ref()
        .or(stream.tcp_settings.as_ref())
        .and_then(|t| t.header.as_ref());
      if let Some(header) = header {
        out.header_type = first_non_empty([header.kind.as_deref()]);
        if out.header_type == "none" {
          out.header_type.clear();
        }
        if let Some(req) = &header.request {
          out.path = first_non_empty([req.path.as_ref().and_then(|p| p.first())]);
          out.host = first_non_empty([
            req.headers.get("Host").and_then(|h| h.first()),
            req.headers.get("host").and_then(|h| h.first()),
          ]);
        }
      }
    }
    Network::Grpc => {
      if let Some(g) = &stream.grpc_settings {
        out.path = first_non_empty([g.service_name.as_deref()]);
      }
    }
    Network::H2 => {
      if let Some(h) = &stream.http_settings {
        out.path = first_non_empty([h.path.as_deref()]);
        out.host = first_non_empty([h.host.as_ref().and_then(|h| h.first())]);
      }
    }
    Network::HttpUpgrade => {
      if let Some(h) = &stream.httpupgrade_settings {
        out.path = first_non_empty([h.path.as_deref()]);
        out.host = first_non_empty([h.host.as_deref()]);
      }
    }
    Network::Tcp | Network::Raw | Network::H3 | Network::Kcp | Network::Quic => {}
  }
  out
}

/// Request-scoped resolver. Holds the clock and the RNG used for Reality
/// short-id selection; both are injectable for tests.
pub struct HostResolver {
  rng: fastrand::Rng,
  now: DateTime<Utc>,
}

impl Default for HostResolver {
  fn default() -> Self {
    Self::new()
  }
}

impl HostResolver {
  pub fn new() -> Self {
    Self {
      rng: fastrand::Rng::new(),
      now: Utc::now(),
    }
  }

  pub fn with_seed(seed: u64) -> Self {
    Self {
      rng: fastrand::Rng::with_seed(seed),
      now: Utc::now(),
    }
  }

  pub fn at(mut self, now: DateTime<Utc>) -> Self {
    self.now = now;
    self
  }

  /// Fail-closed resolution: any hard failure yields no endpoints at all.
  pub fn resolve(
    &mut self,
    hosts: &[ProxyHostRecord],
    config: &dyn ServerConfig,
    user: &UserSnapshot,
    settings: &Settings,
  ) -> Vec<ProxyEndpoint> {
    match self.try_resolve(hosts, config, user, settings) {
      Ok(endpoints) => endpoints,
      Err(e) => {
        error!(user = %user.short_uuid, "host resolution failed: {e}");
        Vec::new()
      }
    }
  }

  pub fn try_resolve(
    &mut self,
    hosts: &[ProxyHostRecord],
    config: &dyn ServerConfig,
    user: &UserSnapshot,
    settings: &Settings,
  ) -> Result<Vec<ProxyEndpoint>, ResolveError> {
    let remarks = RemarkContext::new(user, self.now);

    if user.status != UserStatus::Active {
      let placeholders = settings
        .remarks_for(user.status)
        .iter()
        .map(|r| placeholder_endpoint(remarks.apply(r)))
        .collect::<Vec<_>>();
      debug!(
        user = %user.short_uuid,
        status = user.status.as_str(),
        count = placeholders.len(),
        "user not active, serving placeholders"
      );
      return Ok(placeholders);
    }

    let mut out = Vec::with_capacity(hosts.len());
    for host in hosts {
      let Some(inbound) = config.inbound(&host.inbound_tag) else {
        warn!(tag = %host.inbound_tag, remark = %host.remark, "no inbound for host, skipping");
        continue;
      };
      let Some(protocol) = Protocol::parse(&inbound.protocol) else {
        warn!(tag = %inbound.tag, protocol = %inbound.protocol, "unsupported inbound protocol, skipping");
        continue;
      };
      out.push(self.resolve_host(host, inbound, protocol, user, settings, &remarks)?);
    }
    Ok(out)
  }

  fn resolve_host(
    &mut self,
    host: &ProxyHostRecord,
    inbound: &InboundDefinition,
    protocol: Protocol,
    user: &UserSnapshot,
    settings: &Settings,
    remarks: &RemarkContext,
  ) -> Result<ProxyEndpoint, ResolveError> {
    let stream = inbound.stream()?;
    let raw_network = stream.network.as_deref().unwrap_or("tcp");
    let network = Network::parse(raw_network).ok_or_else(|| ResolveError::UnknownNetwork {
      tag: inbound.tag.clone(),
      network: raw_network.to_string(),
    })?;
    let raw_security = stream.security.as_deref().unwrap_or("");
    let inbound_security =
      Security::parse(raw_security).ok_or_else(|| ResolveError::UnknownSecurity {
        tag: inbound.tag.clone(),
        security: raw_security.to_string(),
      })?;
    let tls = match host.security_layer {
      SecurityLayer::Default => inbound_security,
      SecurityLayer::Tls => Security::Tls,
      SecurityLayer::None => Security::None,
    };

    let transport = inbound_transport(network, protocol, &stream);
    let path = first_non_empty([host.path.as_deref(), Some(transport.path.as_str())]);
    let host_header = first_non_empty([host.host.as_deref(), Some(transport.host.as_str())]);

    let tls_settings = stream.tls_settings.as_ref();
    let reality_settings = stream.reality_settings.as_ref();

    let inbound_sni = match tls {
      Security::Tls => tls_settings.and_then(|t| t.server_name.as_deref()),
      Security::Reality => reality_settings.and_then(|r| {
        non_empty(r.server_name.as_deref()).or(r.server_names.first().map(|s| s.as_str()))
      }),
      Security::None | Security::Unset => None,
    };
    let address_sni = is_domain_name(&host.address).then_some(host.address.as_str());
    let sni = first_non_empty([host.sni.as_deref(), inbound_sni, address_sni]);

    let inbound_fp = match tls {
      Security::Tls => tls_settings.and_then(|t| t.fingerprint.as_deref()),
      Security::Reality => reality_settings.and_then(|r| r.fingerprint.as_deref()),
      Security::None | Security::Unset => None,
    };
    let fingerprint = first_non_empty([host.fingerprint.as_deref(), inbound_fp]);

    let inbound_alpn = match tls {
      Security::Tls => tls_settings.map(|t| t.alpn.join(",")),
      _ => None,
    };
    let alpn = first_non_empty([host.alpn.as_deref(), inbound_alpn.as_deref()]);

    let reality = if tls == Security::Reality {
      let r = reality_settings.cloned().unwrap_or_default();
      let public_key = non_empty(r.public_key.as_deref())
        .ok_or_else(|| ResolveError::MissingRealityPublicKey {
          tag: inbound.tag.clone(),
        })?
        .to_string();
      let short_id = if r.short_ids.is_empty() {
        String::new()
      } else {
        r.short_ids[self.rng.usize(..r.short_ids.len())].clone()
      };
      Some(RealityParams {
        public_key,
        short_id,
        spider_x: r.spider_x.unwrap_or_default(),
      })
    } else {
      None
    };

    Ok(ProxyEndpoint {
      remark: remarks.apply(&host.remark),
      address: host.address.clone(),
      port: host.port,
      protocol,
      network,
      path,
      host: host_header,
      tls,
      sni,
      fingerprint,
      alpn,
      allow_insecure: host.allow_insecure,
      reality,
      credentials: Credentials::of(user),
      ss_method: inbound.ss_method().unwrap_or_else(|| settings.ss_method.clone()),
      header_type: transport.header_type,
      additional_params: transport.additional,
    })
  }
}

fn placeholder_endpoint(remark: String) -> ProxyEndpoint {
  ProxyEndpoint {
    remark,
    address: PLACEHOLDER_ADDRESS.to_string(),
    port: 0,
    protocol: Protocol::Trojan,
    network: Network::Tcp,
    path: String::new(),
    host: String::new(),
    tls: Security::Unset,
    sni: String::new(),
    fingerprint: String::new(),
    alpn: String::new(),
    allow_insecure: false,
    reality: None,
    credentials: Credentials {
      trojan_password: PLACEHOLDER_PASSWORD.to_string(),
      vless_uuid: PLACEHOLDER_UUID.to_string(),
      ss_password: PLACEHOLDER_PASSWORD.to_string(),
    },
    ss_method: crate::settings::DEFAULT_SS_METHOD.to_string(),
    header_type: String::new(),
    additional_params: AdditionalParams::default(),
  }
}
