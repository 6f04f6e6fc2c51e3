//! Command-line surface of the `dealsight` binary.

pub mod commands;
pub mod display;
pub mod sources;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "dealsight")]
#[command(
  about = "Dealsight - Feedback Consolidation\nGroups product feedback into prioritized clusters and links them to dealblocker issues"
)]
#[command(version)]
pub struct Cli {
  /// Settings file (defaults to ./dealsight.yaml when present)
  #[arg(long, global = true, env = "DEALSIGHT_CONFIG")]
  pub config: Option<PathBuf>,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Command,
}

/// Where raw feedback comes from
#[derive(Args, Debug, Clone)]
pub struct FeedbackInput {
  /// CSV file, or a text file with one feedback item per line
  #[arg(short, long)]
  pub input: PathBuf,
  /// Text column(s) to read; repeat to concatenate several
  #[arg(short = 'c', long = "column")]
  pub columns: Vec<String>,
  /// Steering hint for clustering and summarization
  #[arg(long)]
  pub context: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
  /// Cluster and summarize feedback
  Cluster {
    #[command(flatten)]
    feedback: FeedbackInput,
    /// Write the cluster table here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Link a cluster table to an issue table
  Link {
    /// Cluster table produced by `cluster`
    #[arg(long)]
    clusters: PathBuf,
    /// Issue table with `Issue Key` and `Summary` columns
    #[arg(long)]
    issues: PathBuf,
    /// Minimum similarity for a semantic match (0-1)
    #[arg(short, long)]
    threshold: Option<f32>,
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Cluster feedback and link it to issues in one run
  Analyze {
    #[command(flatten)]
    feedback: FeedbackInput,
    #[arg(long)]
    issues: PathBuf,
    #[arg(short, long)]
    threshold: Option<f32>,
    /// Directory receiving clusters.csv and links.csv
    #[arg(long, default_value = "dealsight-output")]
    output_dir: PathBuf,
  },
  /// Score issues by urgency keywords in their descriptions
  Dealblockers {
    #[arg(long)]
    issues: PathBuf,
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Export Jira search results as an issue table
  FetchIssues {
    /// JQL query, e.g. "project = DEAL AND status != Done"
    #[arg(long)]
    jql: String,
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Export Slack channel history as a feedback table
  FetchSlack {
    /// Channel id, e.g. C0123456
    #[arg(long)]
    channel: String,
    #[arg(long, default_value_t = connectors::slack::DEFAULT_LIMIT)]
    limit: u32,
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

pub async fn run(cli: Cli) -> Result<()> {
  let settings = Settings::load(cli.config.as_deref())?;

  match cli.command {
    Command::Cluster { feedback, output } => {
      commands::cluster(&settings, &feedback, output.as_deref()).await
    }
    Command::Link { clusters, issues, threshold, output } => {
      commands::link(&settings, &clusters, &issues, threshold, output.as_deref()).await
    }
    Command::Analyze { feedback, issues, threshold, output_dir } => {
      commands::analyze(&settings, &feedback, &issues, threshold, &output_dir).await
    }
    Command::Dealblockers { issues, output } => commands::dealblockers(&issues, output.as_deref()),
    Command::FetchIssues { jql, output } => {
      commands::fetch_issues(&settings, &jql, output.as_deref()).await
    }
    Command::FetchSlack { channel, limit, output } => {
      commands::fetch_slack(&channel, limit, output.as_deref()).await
    }
  }
}
