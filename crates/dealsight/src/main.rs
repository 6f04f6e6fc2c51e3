use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use dealsight::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // stdout carries CSV, so logs go to stderr
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    if cli.verbose {
      EnvFilter::new("dealsight=debug,connectors=debug,ort=warn,warn")
    } else {
      EnvFilter::new("dealsight=info,connectors=info,ort=error,warn")
    }
  });
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(filter)
    .init();

  cli::run(cli).await
}
