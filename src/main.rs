mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate one subscription from a request document and print the body.
  Generate(commands::generate::Args),

  /// Export a single Shadowsocks host as an Outline access config.
  Outline(commands::outline::Args),

  /// Print which client ecosystem a user agent maps to (JSON).
  Detect(commands::detect::Args),

  /// Generate subscriptions for JSONL request documents (stdout JSONL, 1 result per line).
  Batch(commands::batch::Args),
}

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("edgesub=info,edgesub_rs=info"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();
  match cli.command {
    Commands::Generate(args) => commands::generate::run(args).await,
    Commands::Outline(args) => commands::outline::run(args).await,
    Commands::Detect(args) => commands::detect::run(args).await,
    Commands::Batch(args) => commands::batch::run(args).await,
  }
}
