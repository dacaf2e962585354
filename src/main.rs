use anyhow::{Context, Result};
use clap::Parser;
use incidentweave::config::{
  ContentLengthBounds, DEFAULT_CHANNEL_CAPACITY, DEFAULT_WORKER_COUNT, FetchConfig, PipelineConfig,
};
use incidentweave::fetch::fetch_incidents;
use incidentweave::incident::PrioritySum;
use incidentweave::pipeline::Pipeline;
use incidentweave::table;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetch an incident report and aggregate it by priority
#[derive(Parser, Debug)]
#[command(name = "incidentweave", version)]
#[command(
  about = "Fetch an incident report, print it, and aggregate it by priority",
  long_about = None
)]
struct Cli {
  /// URL of the incident report
  url: String,

  /// Number of concurrent partial-merge workers
  #[arg(short, long, default_value_t = DEFAULT_WORKER_COUNT)]
  workers: usize,

  /// Capacity of the pipeline's internal channels
  #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
  channel_capacity: usize,

  /// Seconds before the aggregation run is cancelled
  #[arg(long, default_value_t = 30)]
  timeout: u64,

  /// Seconds allowed for each request attempt
  #[arg(long, default_value_t = 2)]
  request_timeout: u64,

  /// Total number of request attempts
  #[arg(long, default_value_t = 5)]
  attempts: u32,

  /// Accept any Content-Length
  #[arg(long)]
  skip_length_check: bool,

  /// Enable verbose output (-v for debug, -vv for trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);
  debug!(?cli, "parsed arguments");

  let fetch_config = FetchConfig::default()
    .with_request_timeout(Duration::from_secs(cli.request_timeout))
    .with_attempts(cli.attempts)
    .with_content_length(if cli.skip_length_check {
      None
    } else {
      Some(ContentLengthBounds::default())
    });
  let report = fetch_incidents(&fetch_config, &cli.url)
    .await
    .with_context(|| format!("failed to fetch incidents from {}", cli.url))?;
  println!("{}", table::render(&report.report));

  let pipeline = Pipeline::new(
    PipelineConfig::default()
      .with_worker_count(cli.workers)
      .with_channel_capacity(cli.channel_capacity)
      .with_name("priority"),
  )?;

  let deadline = Duration::from_secs(cli.timeout);
  let cancel = pipeline.cancellation_token().clone();
  let watchdog = tokio::spawn(async move {
    tokio::select! {
      _ = tokio::time::sleep(deadline) => {
        warn!(?deadline, "aggregation deadline reached, cancelling");
      }
      _ = tokio::signal::ctrl_c() => warn!("interrupted, cancelling"),
    }
    cancel.cancel();
  });

  let aggregate = pipeline.run(&report.report).await;
  watchdog.abort();
  let aggregate = aggregate.context("failed to aggregate incidents by priority")?;

  println!("{}", table::render(&PrioritySum::from_aggregate(&aggregate)));
  Ok(())
}

fn init_tracing(verbose: u8) {
  let default_level = match verbose {
    0 => "info",
    1 => "debug",
    _ => "trace",
  };
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}
