use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tracing::warn;

use edgesub::{SubscriptionRequest, SubscriptionService};

use super::ServiceArgs;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// JSONL file with one request document per line.
  #[arg(long)]
  pub input: Option<PathBuf>,

  /// Read JSONL requests from stdin.
  #[arg(long, default_value_t = false)]
  pub stdin: bool,

  #[command(flatten)]
  pub service: ServiceArgs,

  /// Max requests generated at once.
  #[arg(long, default_value_t = 8)]
  pub concurrency: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchOut {
  #[serde(skip_serializing_if = "Option::is_none")]
  id: Option<String>,
  line: usize,
  ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  format: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  content_type: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  headers: Vec<(String, String)>,
  #[serde(skip_serializing_if = "Option::is_none")]
  body: Option<String>,
  ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

impl BatchOut {
  fn failed(line: usize, ms: u64, error: String) -> Self {
    Self {
      id: None,
      line,
      ok: false,
      format: None,
      content_type: None,
      headers: Vec::new(),
      body: None,
      ms,
      error: Some(error),
    }
  }
}

async fn read_lines<R: AsyncBufRead + Unpin>(reader: R, out: &mut Vec<(usize, String)>) -> Result<()> {
  let mut lines = reader.lines();
  let mut n = 0;
  while let Some(line) = lines.next_line().await? {
    n += 1;
    let s = line.trim();
    if s.is_empty() {
      continue;
    }
    out.push((n, s.to_string()));
  }
  Ok(())
}

async fn read_requests(args: &Args) -> Result<Vec<(usize, String)>> {
  let mut out = Vec::new();
  if args.stdin {
    read_lines(BufReader::new(tokio::io::stdin()), &mut out).await?;
  }
  if let Some(path) = &args.input {
    let file = tokio::fs::File::open(path)
      .await
      .with_context(|| format!("open {}", path.display()))?;
    read_lines(BufReader::new(file), &mut out).await?;
  }
  Ok(out)
}

fn generate_one(service: &SubscriptionService, line: usize, text: &str) -> BatchOut {
  let t0 = Instant::now();
  let request: SubscriptionRequest = match serde_json::from_str(text) {
    Ok(r) => r,
    Err(e) => {
      warn!(line, "bad request document: {e}");
      return BatchOut::failed(line, t0.elapsed().as_millis() as u64, format!("parse: {e}"));
    }
  };
  let format = request.format();
  let response = service.generate(&request);
  BatchOut {
    id: request.id,
    line,
    ok: !response.is_empty(),
    format: Some(format.as_str()),
    content_type: Some(response.content_type),
    headers: response.headers,
    body: Some(response.body),
    ms: t0.elapsed().as_millis() as u64,
    error: None,
  }
}

pub async fn run(args: Args) -> Result<()> {
  let requests = read_requests(&args).await.context("read requests")?;
  if requests.is_empty() {
    return Ok(());
  }

  let service = Arc::new(args.service.service()?);
  let sem = Arc::new(Semaphore::new(std::cmp::max(1, args.concurrency)));
  let mut handles = Vec::with_capacity(requests.len());

  for (line, text) in requests {
    let sem = sem.clone();
    let service = service.clone();
    let handle = tokio::spawn(async move {
      let _permit = sem.acquire_owned().await?;
      let out = tokio::task::spawn_blocking(move || generate_one(&service, line, &text)).await?;
      anyhow::Ok(out)
    });
    handles.push((line, handle));
  }

  for (line, h) in handles {
    let joined = h.await.map_err(anyhow::Error::from).and_then(|r| r);
    super::print_json(&settle(line, joined))?;
  }

  Ok(())
}

/// Every input line gets an output line, even when its task died.
fn settle(line: usize, joined: Result<BatchOut>) -> BatchOut {
  joined.unwrap_or_else(|e| {
    warn!(line, "batch task failed: {e:#}");
    BatchOut::failed(line, 0, format!("task: {e:#}"))
  })
}
