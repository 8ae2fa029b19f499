//! Raw share links (`vless://`, `trojan://`, `ss://`) for Xray-family clients.

use base64::engine::general_purpose;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

use crate::error::BuildError;
use crate::model::{Protocol, ProxyEndpoint, Security};
use crate::transport::Transport;

/// RFC 3986 unreserved characters stay literal.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~');

const VISION_FLOW: &str = "xtls-rprx-vision";

fn encode_component(s: &str) -> String {
  utf8_percent_encode(s, COMPONENT).to_string()
}

pub struct LinkEncoder {
  base64_whole: bool,
}

impl LinkEncoder {
  pub fn new(base64_whole: bool) -> Self {
    Self { base64_whole }
  }

  pub fn build(&self, endpoints: &[ProxyEndpoint]) -> Result<String, BuildError> {
    let joined = endpoints
      .iter()
      .map(encode_endpoint)
      .collect::<Result<Vec<_>, _>>()?
      .join("\n");
    if self.base64_whole {
      Ok(general_purpose::STANDARD.encode(joined.as_bytes()))
    } else {
      Ok(joined)
    }
  }
}

pub fn encode_endpoint(ep: &ProxyEndpoint) -> Result<String, BuildError> {
  let authority = format!("{}:{}", ep.authority_host(), ep.port);
  let remark = encode_component(&ep.remark);
  let link = match ep.protocol {
    Protocol::Vless => format!(
      "vless://{}@{authority}?{}#{remark}",
      ep.credentials.vless_uuid,
      query(ep)?
    ),
    Protocol::Trojan => format!(
      "trojan://{}@{authority}?{}#{remark}",
      encode_component(&ep.credentials.trojan_password),
      query(ep)?
    ),
    Protocol::Shadowsocks => {
      let userinfo = general_purpose::STANDARD
        .encode(format!("{}:{}", ep.ss_method, ep.credentials.ss_password).as_bytes());
      format!("ss://{userinfo}@{authority}#{remark}")
    }
  };
  Ok(link)
}

fn wants_vision_flow(ep: &ProxyEndpoint, transport: &Transport<'_>) -> bool {
  ep.protocol == Protocol::Vless
    && ep.tls.is_secure()
    && matches!(transport, Transport::Tcp { http_disguise: false, .. })
}

fn query(ep: &ProxyEndpoint) -> Result<String, serde_json::Error> {
  let mut q = form_urlencoded::Serializer::new(String::new());
  if ep.protocol == Protocol::Vless {
    q.append_pair("encryption", "none");
  }
  let security = match ep.tls {
    Security::Unset => "none",
    other => other.as_str(),
  };
  q.append_pair("security", security);
  q.append_pair("type", ep.network.as_str());
  if !ep.header_type.is_empty() {
    q.append_pair("headerType", &ep.header_type);
  }

  let transport = Transport::of(ep);
  let mut put = |key: &str, value: &str| {
    if !value.is_empty() {
      q.append_pair(key, value);
    }
  };
  match transport {
    Transport::Tcp { path, host, .. } | Transport::H2 { path, host } | Transport::HttpUpgrade { path, host } => {
      put("path", path);
      put("host", host);
    }
    Transport::Ws {
      path,
      host,
      heartbeat_period,
    } => {
      put("path", path);
      put("host", host);
      if let Some(period) = heartbeat_period {
        put("heartbeatPeriod", &period.to_string());
      }
    }
    Transport::Grpc { service_name, host } => {
      put("serviceName", service_name);
      put("authority", host);
      put("mode", "gun");
    }
    Transport::Xhttp { path, host, extra } => {
      put("path", path);
      put("host", host);
      if let Some(extra) = extra {
        put("mode", &extra.mode);
        let blob = serde_json::to_string(extra)?;
        put("extra", &blob);
      }
    }
    // No query representation for these yet.
    Transport::H3 | Transport::Kcp | Transport::Quic => {}
  }

  if wants_vision_flow(ep, &transport) {
    q.append_pair("flow", VISION_FLOW);
  }

  match ep.tls {
    Security::Tls => {
      put_non_empty(&mut q, "sni", &ep.sni);
      put_non_empty(&mut q, "fp", &ep.fingerprint);
      put_non_empty(&mut q, "alpn", &ep.alpn);
      if ep.allow_insecure {
        q.append_pair("allowInsecure", "1");
      }
    }
    Security::Reality => {
      put_non_empty(&mut q, "sni", &ep.sni);
      put_non_empty(&mut q, "fp", &ep.fingerprint);
      if let Some(r) = &ep.reality {
        q.append_pair("pbk", &r.public_key);
        q.append_pair("sid", &r.short_id);
        put_non_empty(&mut q, "spx", &r.spider_x);
      }
    }
    Security::None | Security::Unset => {}
  }
  Ok(q.finish())
}

fn put_non_empty(q: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &str) {
  if !value.is_empty() {
    q.append_pair(key, value);
  }
}
