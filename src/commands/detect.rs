use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;

use edgesub::format::{select_format, singbox_version, ClientFormat};

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Client identification string (User-Agent).
  #[arg(long, default_value = "")]
  pub user_agent: String,

  /// Explicit client type; wins over detection when recognised.
  #[arg(long)]
  pub client: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectOut {
  format: ClientFormat,
  content_type: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  singbox_version: Option<String>,
}

pub async fn run(args: Args) -> Result<()> {
  let format = args
    .client
    .as_deref()
    .and_then(ClientFormat::from_client_type)
    .unwrap_or_else(|| select_format(&args.user_agent));
  let singbox_version = match format {
    ClientFormat::SingBox => singbox_version(&args.user_agent),
    _ => None,
  };
  super::print_json(&DetectOut {
    format,
    content_type: format.content_type(),
    singbox_version,
  })
}
