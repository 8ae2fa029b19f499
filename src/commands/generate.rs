use anyhow::Result;
use clap::Args as ClapArgs;
use tokio::io::AsyncWriteExt;

use super::{RequestArgs, ServiceArgs};

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  #[command(flatten)]
  pub request: RequestArgs,

  #[command(flatten)]
  pub service: ServiceArgs,

  /// Overrides the request's userAgent.
  #[arg(long)]
  pub user_agent: Option<String>,

  /// Overrides the request's client type.
  #[arg(long)]
  pub client: Option<String>,

  /// Print the whole response (content type, headers, body) as one JSON line.
  #[arg(long, default_value_t = false)]
  pub headers: bool,
}

pub async fn run(args: Args) -> Result<()> {
  let service = args.service.service()?;
  let mut request = args.request.load().await?;
  if let Some(ua) = args.user_agent {
    request.user_agent = ua;
  }
  if args.client.is_some() {
    request.client = args.client;
  }

  let response = service.generate(&request);
  if args.headers {
    return super::print_json(&response);
  }
  let mut stdout = tokio::io::stdout();
  stdout.write_all(response.body.as_bytes()).await?;
  stdout.flush().await?;
  Ok(())
}
