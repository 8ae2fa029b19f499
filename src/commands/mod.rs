pub mod batch;
pub mod detect;
pub mod generate;
pub mod outline;

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use edgesub::{Settings, SubscriptionRequest, SubscriptionService};

#[derive(ClapArgs, Debug, Clone)]
pub struct ServiceArgs {
  /// Settings file (YAML or JSON). Defaults apply when omitted.
  #[arg(long)]
  pub settings: Option<PathBuf>,

  /// Directory with template overrides (clash.yaml, stash.yaml, clash_meta.yaml, singbox.json).
  #[arg(long)]
  pub templates_dir: Option<PathBuf>,
}

impl ServiceArgs {
  pub fn service(&self) -> Result<SubscriptionService> {
    let mut settings = match &self.settings {
      Some(path) => Settings::load(path)?,
      None => Settings::default(),
    };
    if let Some(dir) = &self.templates_dir {
      settings.templates_dir = Some(dir.clone());
    }
    SubscriptionService::new(settings).context("load templates")
  }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RequestArgs {
  /// Request document (JSON): { id?, userAgent?, client?, user, hosts[], xrayConfig }.
  #[arg(long)]
  pub request: Option<PathBuf>,

  /// Read the request document from stdin.
  #[arg(long, default_value_t = false)]
  pub stdin: bool,
}

impl RequestArgs {
  pub async fn load(&self) -> Result<SubscriptionRequest> {
    let text = if self.stdin {
      let mut buf = String::new();
      tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("read stdin")?;
      buf
    } else if let Some(path) = &self.request {
      tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?
    } else {
      bail!("either --request or --stdin is required");
    };
    serde_json::from_str(&text).context("parse request document")
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string(value)?);
  Ok(())
}
