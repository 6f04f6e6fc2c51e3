//! Handlers behind each subcommand.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use connectors::{JiraClient, JiraConfig, SlackClient};

use super::{display, sources, FeedbackInput};
use crate::config::{validate_similarity_threshold, Settings};
use crate::embeddings::EmbeddingProvider;
use crate::link::RecordLinker;
use crate::model::{ClusterSummary, FeedbackRow};
use crate::pipeline::Pipeline;
use crate::summarize::{self, SummarizationClient};
use crate::table;
use crate::urgency::summarize_dealblockers;

pub async fn cluster(
  settings: &Settings,
  feedback: &FeedbackInput,
  output: Option<&Path>,
) -> Result<()> {
  let client = summarization_client(settings)?;
  let rows = read_feedback(feedback)?;

  let pipeline = Pipeline::new(settings, embedding_provider(settings), client);
  let summaries = pipeline.cluster_and_summarize(&rows, feedback.context.as_deref()).await?;

  table::write_cluster_table(output_writer(output)?, &summaries)?;
  eprintln!("{}", display::cluster_overview(&summaries));
  Ok(())
}

pub async fn link(
  settings: &Settings,
  clusters: &Path,
  issues: &Path,
  threshold: Option<f32>,
  output: Option<&Path>,
) -> Result<()> {
  let threshold = threshold.unwrap_or(settings.linking.similarity_threshold);
  validate_similarity_threshold(threshold)?;

  let clusters = read_clusters(clusters)?;
  let issues = read_issues(issues)?;

  let linker = RecordLinker::new(embedding_provider(settings));
  let links = linker.link(&clusters, &issues, threshold).await?;

  table::write_link_table(output_writer(output)?, &links)?;
  eprintln!("{}", display::link_overview(&links, clusters.len()));
  Ok(())
}

pub async fn analyze(
  settings: &Settings,
  feedback: &FeedbackInput,
  issues: &Path,
  threshold: Option<f32>,
  output_dir: &Path,
) -> Result<()> {
  let threshold = threshold.unwrap_or(settings.linking.similarity_threshold);
  validate_similarity_threshold(threshold)?;

  let client = summarization_client(settings)?;
  let rows = read_feedback(feedback)?;
  let issues = read_issues(issues)?;

  let pipeline = Pipeline::new(settings, embedding_provider(settings), client);
  let summaries = pipeline.cluster_and_summarize(&rows, feedback.context.as_deref()).await?;
  let links = pipeline.link(&summaries, &issues, threshold).await?;

  fs::create_dir_all(output_dir)
    .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
  let clusters_path = output_dir.join("clusters.csv");
  let links_path = output_dir.join("links.csv");
  table::write_cluster_table(output_writer(Some(&clusters_path))?, &summaries)?;
  table::write_link_table(output_writer(Some(&links_path))?, &links)?;

  eprintln!("{}", display::cluster_overview(&summaries));
  eprintln!("{}", display::link_overview(&links, summaries.len()));
  info!("Wrote {} and {}", clusters_path.display(), links_path.display());
  Ok(())
}

pub fn dealblockers(issues: &Path, output: Option<&Path>) -> Result<()> {
  let issues = read_issues(issues)?;
  let rows = summarize_dealblockers(&issues);

  table::write_dealblocker_table(output_writer(output)?, &rows)?;
  eprintln!("{}", display::dealblocker_overview(&rows));
  Ok(())
}

pub async fn fetch_issues(settings: &Settings, jql: &str, output: Option<&Path>) -> Result<()> {
  let config = JiraConfig::from_env(settings.jira.base_url.clone())?
    .with_max_results(settings.jira.max_results)
    .with_fields(settings.jira.fields.clone());
  let client = JiraClient::new(config)?;

  let issues: Vec<_> =
    client.search(jql).await?.into_iter().map(sources::issue_from_jira).collect();

  table::write_issue_table(output_writer(output)?, &issues)?;
  eprintln!("Fetched {} issues", issues.len());
  Ok(())
}

pub async fn fetch_slack(channel: &str, limit: u32, output: Option<&Path>) -> Result<()> {
  let client = SlackClient::from_env()?;
  let rows: Vec<FeedbackRow> = client
    .channel_history(channel, limit)
    .await?
    .into_iter()
    .map(|message| sources::feedback_from_slack(channel, message))
    .collect();

  table::write_feedback_table(output_writer(output)?, &rows)?;
  eprintln!("Fetched {} messages from {channel}", rows.len());
  Ok(())
}

fn summarization_client(settings: &Settings) -> Result<Arc<dyn SummarizationClient>> {
  let variable = summarize::api_key_variable(settings.summarizer.provider);
  let client = summarize::client_from_settings(&settings.summarizer, std::env::var(variable).ok())?;
  info!("Summarizing with {} ({})", client.name(), settings.summarizer.model_name());
  Ok(client)
}

fn embedding_provider(settings: &Settings) -> Arc<EmbeddingProvider> {
  Arc::new(EmbeddingProvider::onnx(settings.embedding.clone()))
}

fn read_feedback(feedback: &FeedbackInput) -> Result<Vec<FeedbackRow>> {
  table::read_feedback_file(&feedback.input, &feedback.columns)
    .with_context(|| format!("Failed to read feedback from {}", feedback.input.display()))
}

fn read_clusters(path: &Path) -> Result<Vec<ClusterSummary>> {
  let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
  Ok(table::read_cluster_table(BufReader::new(file))?)
}

fn read_issues(path: &Path) -> Result<Vec<crate::model::IssueRecord>> {
  let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
  Ok(table::read_issue_table(BufReader::new(file))?)
}

fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
  match path {
    Some(path) => {
      if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
      }
      let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
      Ok(Box::new(BufWriter::new(file)))
    }
    None => Ok(Box::new(io::stdout().lock())),
  }
}
