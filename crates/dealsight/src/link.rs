//! Maps cluster summaries onto issue-tracker records.
//!
//! Pass 1 links every issue key a summary names explicitly. Summaries with no
//! explicit hit fall through to pass 2, which embeds their reasoning and
//! takes the single closest issue summary if it clears the threshold.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::validate_similarity_threshold;
use crate::embeddings::{similarity, EmbeddingProvider};
use crate::error::Result;
use crate::model::{ClusterSummary, IssueRecord, Link, MatchType};

pub struct RecordLinker {
  embeddings: Arc<EmbeddingProvider>,
}

impl RecordLinker {
  pub fn new(embeddings: Arc<EmbeddingProvider>) -> Self {
    Self { embeddings }
  }

  /// Links `clusters` to `issues`. Output is ordered by `match_score`,
  /// highest first; ties keep pass order.
  pub async fn link(
    &self,
    clusters: &[ClusterSummary],
    issues: &[IssueRecord],
    threshold: f32,
  ) -> Result<Vec<Link>> {
    validate_similarity_threshold(threshold)?;

    if clusters.is_empty() || issues.is_empty() {
      debug!("Nothing to link ({} clusters, {} issues)", clusters.len(), issues.len());
      return Ok(Vec::new());
    }

    let (mut links, unmatched) = explicit_pass(clusters, issues);
    info!(
      "{} explicit links, {} clusters left for semantic matching",
      links.len(),
      unmatched.len()
    );

    if !unmatched.is_empty() {
      links.extend(self.semantic_pass(&unmatched, issues, threshold).await?);
    }

    links.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    Ok(links)
  }

  async fn semantic_pass(
    &self,
    clusters: &[&ClusterSummary],
    issues: &[IssueRecord],
    threshold: f32,
  ) -> Result<Vec<Link>> {
    let queries: Vec<String> = clusters.iter().map(|cluster| semantic_query(cluster)).collect();
    let summaries: Vec<String> = issues.iter().map(|issue| issue.summary.clone()).collect();

    let query_vectors = self.embeddings.embed(&queries).await?;
    let issue_vectors = self.embeddings.embed(&summaries).await?;

    let mut links = Vec::new();
    for (cluster, query) in clusters.iter().zip(&query_vectors) {
      let Some((best, score)) = best_match(query, &issue_vectors) else {
        continue;
      };

      if score >= threshold {
        links.push(make_link(cluster, &issues[best], MatchType::Semantic, score));
      } else {
        debug!("'{}' best score {score:.3} below {threshold}", cluster.cluster_label);
      }
    }
    Ok(links)
  }
}

/// Explicit-key links, plus the summaries that produced none.
fn explicit_pass<'a>(
  clusters: &'a [ClusterSummary],
  issues: &[IssueRecord],
) -> (Vec<Link>, Vec<&'a ClusterSummary>) {
  let mut index: HashMap<String, usize> = HashMap::new();
  for (i, issue) in issues.iter().enumerate() {
    index.entry(key_form(&issue.issue_key)).or_insert(i);
  }

  let mut links = Vec::new();
  let mut unmatched = Vec::new();

  for cluster in clusters {
    let mut seen = HashSet::new();
    let matched: Vec<usize> = cluster
      .issue_keys
      .iter()
      .filter_map(|key| index.get(&key_form(key)).copied())
      .filter(|i| seen.insert(*i))
      .collect();

    if matched.is_empty() {
      unmatched.push(cluster);
      continue;
    }
    links.extend(
      matched.into_iter().map(|i| make_link(cluster, &issues[i], MatchType::ExplicitKey, 1.0)),
    );
  }

  (links, unmatched)
}

fn key_form(key: &str) -> String {
  key.trim().to_uppercase()
}

fn semantic_query(cluster: &ClusterSummary) -> String {
  if cluster.reasoning.trim().is_empty() {
    cluster.cluster_label.clone()
  } else {
    cluster.reasoning.clone()
  }
}

/// Index and score of the most similar candidate; the earliest wins ties.
/// Vectors are unit length, so the dot product is the cosine similarity.
fn best_match(query: &[f32], candidates: &[Vec<f32>]) -> Option<(usize, f32)> {
  candidates
    .iter()
    .map(|candidate| similarity::dot(query, candidate).clamp(0.0, 1.0))
    .enumerate()
    .fold(None, |best, (i, score)| match best {
      Some((_, best_score)) if best_score >= score => best,
      _ => Some((i, score)),
    })
}

fn make_link(
  cluster: &ClusterSummary,
  issue: &IssueRecord,
  match_type: MatchType,
  score: f32,
) -> Link {
  Link {
    cluster_label: cluster.cluster_label.clone(),
    reasoning: cluster.reasoning.clone(),
    request_count: cluster.request_count,
    matched_issue_key: issue.issue_key.clone(),
    matched_summary: issue.summary.clone(),
    match_type,
    match_score: score,
  }
}
