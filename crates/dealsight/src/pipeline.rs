//! Entry points used by callers: feedback rows in, cluster table out; cluster
//! and issue tables in, link table out.

use std::sync::Arc;
use tracing::info;

use crate::cluster::ClusterEngine;
use crate::config::Settings;
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::link::RecordLinker;
use crate::model::{ClusterSummary, FeedbackRow, IssueRecord, Link};
use crate::summarize::{SummarizationClient, Summarizer};

pub struct Pipeline {
  engine: ClusterEngine,
  summarizer: Summarizer,
  linker: RecordLinker,
  similarity_threshold: f32,
}

impl Pipeline {
  /// Wires every stage to the same embedding provider, so the model is
  /// loaded at most once per process.
  pub fn new(
    settings: &Settings,
    embeddings: Arc<EmbeddingProvider>,
    client: Arc<dyn SummarizationClient>,
  ) -> Self {
    Self {
      engine: ClusterEngine::new(embeddings.clone(), settings.clustering.distance_threshold),
      summarizer: Summarizer::new(client, &settings.summarizer),
      linker: RecordLinker::new(embeddings),
      similarity_threshold: settings.linking.similarity_threshold,
    }
  }

  pub fn from_parts(engine: ClusterEngine, summarizer: Summarizer, linker: RecordLinker) -> Self {
    Self { engine, summarizer, linker, similarity_threshold: crate::config::SIMILARITY_THRESHOLD }
  }

  /// Configured linking floor, used when the caller does not pass one.
  pub fn similarity_threshold(&self) -> f32 {
    self.similarity_threshold
  }

  /// Clusters the feedback and summarizes every cluster. One summary per
  /// cluster, ordered by priority then volume.
  pub async fn cluster_and_summarize(
    &self,
    rows: &[FeedbackRow],
    context: Option<&str>,
  ) -> Result<Vec<ClusterSummary>> {
    let texts: Vec<String> = rows.iter().map(|row| row.text.clone()).collect();
    info!("Clustering {} feedback rows", texts.len());

    let clusters = self.engine.cluster(&texts, context).await?;
    info!("Formed {} clusters", clusters.len());

    Ok(self.summarizer.summarize_all(&clusters, context).await)
  }

  pub async fn link(
    &self,
    clusters: &[ClusterSummary],
    issues: &[IssueRecord],
    threshold: f32,
  ) -> Result<Vec<Link>> {
    let links = self.linker.link(clusters, issues, threshold).await?;
    info!("Linked {} of {} clusters", count_linked(&links), clusters.len());
    Ok(links)
  }
}

fn count_linked(links: &[Link]) -> usize {
  let mut labels: Vec<&str> = links.iter().map(|link| link.cluster_label.as_str()).collect();
  labels.sort_unstable();
  labels.dedup();
  labels.len()
}
