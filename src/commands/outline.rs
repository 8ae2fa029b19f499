use anyhow::Result;
use clap::Args as ClapArgs;

use super::{RequestArgs, ServiceArgs};

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  #[command(flatten)]
  pub request: RequestArgs,

  #[command(flatten)]
  pub service: ServiceArgs,

  /// Base64-encoded remark of the Shadowsocks host to export.
  #[arg(long)]
  pub tag: String,
}

pub async fn run(args: Args) -> Result<()> {
  let service = args.service.service()?;
  let request = args.request.load().await?;
  let response = service.outline(&request, &args.tag);
  println!("{}", response.body);
  Ok(())
}
