//! Tagged view of an endpoint's transport.
//!
//! Builders match on [`Transport`] exhaustively, so a network that an
//! ecosystem cannot express has to be dropped explicitly in that builder.

use crate::model::{Network, ProxyEndpoint, XhttpExtra};

pub const EARLY_DATA_HEADER_NAME: &str = "Sec-WebSocket-Protocol";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyData {
  pub path: String,
  pub max_early_data: Option<u32>,
}

impl EarlyData {
  pub fn header_name(&self) -> Option<&'static str> {
    self.max_early_data.map(|_| EARLY_DATA_HEADER_NAME)
  }
}

/// Splits `/ws?ed=2560/` into `/ws` and `2560`.
///
/// Best effort: an unparsable `ed` value leaves the path untouched and
/// reports no early data.
pub fn parse_early_data(path: &str) -> EarlyData {
  let Some((real_path, rest)) = path.split_once("?ed=") else {
    return EarlyData {
      path: path.to_string(),
      max_early_data: None,
    };
  };
  let raw = rest.split('/').next().unwrap_or("");
  match raw.trim().parse::<u32>() {
    Ok(n) => EarlyData {
      path: real_path.to_string(),
      max_early_data: Some(n),
    },
    Err(_) => EarlyData {
      path: path.to_string(),
      max_early_data: None,
    },
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport<'a> {
  /// tcp and raw; `http_disguise` when the header type is `http`.
  Tcp {
    http_disguise: bool,
    path: &'a str,
    host: &'a str,
  },
  Ws {
    path: &'a str,
    host: &'a str,
    heartbeat_period: Option<u64>,
  },
  Grpc {
    service_name: &'a str,
    host: &'a str,
  },
  H2 {
    path: &'a str,
    host: &'a str,
  },
  HttpUpgrade {
    path: &'a str,
    host: &'a str,
  },
  Xhttp {
    path: &'a str,
    host: &'a str,
    extra: Option<&'a XhttpExtra>,
  },
  H3,
  Kcp,
  Quic,
}

impl<'a> Transport<'a> {
  pub fn of(ep: &'a ProxyEndpoint) -> Self {
    let path = ep.path.as_str();
    let host = ep.host.as_str();
    match ep.network {
      Network::Tcp | Network::Raw => Self::Tcp {
        http_disguise: ep.header_type == "http",
        path,
        host,
      },
      Network::Ws => Self::Ws {
        path,
        host,
        heartbeat_period: ep.additional_params.heartbeat_period,
      },
      Network::Grpc => Self::Grpc {
        service_name: path,
        host,
      },
      Network::H2 => Self::H2 { path, host },
      Network::HttpUpgrade => Self::HttpUpgrade { path, host },
      Network::Xhttp => Self::Xhttp {
        path,
        host,
        extra: ep.additional_params.xhttp.as_ref(),
      },
      Network::H3 => Self::H3,
      Network::Kcp => Self::Kcp,
      Network::Quic => Self::Quic,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_early_data_split() {
    let ed = parse_early_data("/ws?ed=2560/");
    assert_eq!(ed.path, "/ws");
    assert_eq!(ed.max_early_data, Some(2560));
    assert_eq!(ed.header_name(), Some("Sec-WebSocket-Protocol"));
  }

  #[test]
  fn test_early_data_without_trailing_slash() {
    let ed = parse_early_data("/ws?ed=2048");
    assert_eq!(ed.path, "/ws");
    assert_eq!(ed.max_early_data, Some(2048));
  }

  #[test]
  fn test_plain_path_has_no_early_data() {
    let ed = parse_early_data("/ws");
    assert_eq!(ed.path, "/ws");
    assert_eq!(ed.max_early_data, None);
    assert_eq!(ed.header_name(), None);
  }

  #[test]
  fn test_garbage_early_data_degrades() {
    let ed = parse_early_data("/ws?ed=lots/");
    assert_eq!(ed.path, "/ws?ed=lots/");
    assert_eq!(ed.max_early_data, None);
  }
}
