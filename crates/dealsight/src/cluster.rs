//! Groups feedback texts by embedding proximity.
//!
//! Agglomerative clustering with average linkage over cosine distance, with
//! no target cluster count: merging stops once the two closest clusters are
//! at least `distance_threshold` apart.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::{similarity, EmbeddingProvider};
use crate::error::{PipelineError, Result};
use crate::model::Cluster;
use crate::normalize::clean;

pub struct ClusterEngine {
  embeddings: Arc<EmbeddingProvider>,
  distance_threshold: f32,
}

/// One step of the dendrogram: `left` and `right` are representative points
/// of the two merged clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Merge {
  left: usize,
  right: usize,
  distance: f32,
}

impl ClusterEngine {
  pub fn new(embeddings: Arc<EmbeddingProvider>, distance_threshold: f32) -> Self {
    Self { embeddings, distance_threshold }
  }

  /// Clusters `texts`, returning original texts grouped by cluster. Texts that
  /// clean to nothing are dropped. `context` only biases the embeddings.
  pub async fn cluster(&self, texts: &[String], context: Option<&str>) -> Result<Vec<Cluster>> {
    let prefix = context_prefix(context);

    let (originals, inputs): (Vec<&String>, Vec<String>) = texts
      .iter()
      .filter_map(|text| {
        let cleaned = clean(text);
        (!cleaned.is_empty()).then(|| (text, format!("{prefix}{cleaned}")))
      })
      .unzip();

    if originals.is_empty() {
      return Err(PipelineError::validation("no non-empty feedback text to cluster"));
    }

    let dropped = texts.len() - originals.len();
    if dropped > 0 {
      debug!("Dropped {dropped} feedback rows that were empty after cleaning");
    }

    if originals.len() == 1 {
      return Ok(vec![Cluster { id: 0, member_texts: vec![originals[0].clone()] }]);
    }

    let vectors = self.embeddings.embed(&inputs).await?;
    let labels = agglomerate(&vectors, self.distance_threshold);
    let clusters = group_by_label(&originals, &labels);

    info!("Grouped {} feedback texts into {} clusters", originals.len(), clusters.len());
    Ok(clusters)
  }
}

fn context_prefix(context: Option<&str>) -> String {
  match context.map(clean) {
    Some(cleaned) if !cleaned.is_empty() => format!("Context: {cleaned}. Feedback: "),
    _ => String::new(),
  }
}

/// Assigns a cluster label to every vector. Labels are numbered in order of
/// each cluster's first member.
fn agglomerate(vectors: &[Vec<f32>], distance_threshold: f32) -> Vec<usize> {
  let n = vectors.len();
  let mut merges = nn_chain(distance_matrix(vectors), n);

  // Average linkage has no inversions, so cutting the dendrogram is a replay
  // of the merges below the threshold in ascending distance order.
  merges.sort_by(|a, b| a.distance.total_cmp(&b.distance));

  let mut forest = DisjointSet::new(n);
  for merge in merges.iter().take_while(|merge| merge.distance < distance_threshold) {
    forest.union(merge.left, merge.right);
  }

  let mut labels = Vec::with_capacity(n);
  let mut label_of_root: HashMap<usize, usize> = HashMap::new();
  for point in 0..n {
    let root = forest.find(point);
    let next = label_of_root.len();
    labels.push(*label_of_root.entry(root).or_insert(next));
  }
  labels
}

fn distance_matrix(vectors: &[Vec<f32>]) -> Vec<f32> {
  let n = vectors.len();
  let mut distances = vec![0.0f32; n * n];
  for i in 0..n {
    for j in (i + 1)..n {
      let distance = similarity::cosine_distance(&vectors[i], &vectors[j]);
      distances[i * n + j] = distance;
      distances[j * n + i] = distance;
    }
  }
  distances
}

/// Nearest-neighbour chain with Lance-Williams average-linkage updates.
/// Produces all n-1 merges in O(n^2) time.
fn nn_chain(mut distances: Vec<f32>, n: usize) -> Vec<Merge> {
  let mut active = vec![true; n];
  let mut sizes = vec![1usize; n];
  let mut chain: Vec<usize> = Vec::with_capacity(n);
  let mut merges = Vec::with_capacity(n.saturating_sub(1));

  for _ in 1..n {
    if chain.is_empty() {
      if let Some(first) = active.iter().position(|&is_active| is_active) {
        chain.push(first);
      }
    }

    let (a, b) = loop {
      let Some(&current) = chain.last() else { break (0, 0) };
      let previous = chain.len().checked_sub(2).map(|i| chain[i]);

      // Ties go to the previous chain element so the chain always terminates.
      let mut nearest = previous;
      let mut nearest_distance = previous.map_or(f32::INFINITY, |p| distances[current * n + p]);
      for candidate in (0..n).filter(|&k| active[k] && k != current) {
        let distance = distances[current * n + candidate];
        if distance < nearest_distance {
          nearest = Some(candidate);
          nearest_distance = distance;
        }
      }

      match nearest {
        Some(next) if Some(next) == previous => {
          chain.pop();
          chain.pop();
          break (current, next);
        }
        Some(next) => chain.push(next),
        None => break (current, current),
      }
    };

    if a == b {
      break;
    }

    let (keep, absorbed) = (a.min(b), a.max(b));
    merges.push(Merge { left: keep, right: absorbed, distance: distances[a * n + b] });

    let (size_keep, size_absorbed) = (sizes[keep] as f32, sizes[absorbed] as f32);
    for k in (0..n).filter(|&k| active[k] && k != keep && k != absorbed) {
      let merged = (size_keep * distances[keep * n + k]
        + size_absorbed * distances[absorbed * n + k])
        / (size_keep + size_absorbed);
      distances[keep * n + k] = merged;
      distances[k * n + keep] = merged;
    }
    active[absorbed] = false;
    sizes[keep] += sizes[absorbed];
  }

  merges
}

fn group_by_label(originals: &[&String], labels: &[usize]) -> Vec<Cluster> {
  let mut clusters: Vec<Cluster> = Vec::new();
  for (text, &label) in originals.iter().zip(labels) {
    if label == clusters.len() {
      clusters.push(Cluster { id: label, member_texts: Vec::new() });
    }
    clusters[label].member_texts.push((*text).clone());
  }
  clusters.retain(|cluster| cluster.member_texts.iter().any(|text| !text.trim().is_empty()));
  clusters
}

struct DisjointSet {
  parent: Vec<usize>,
}

impl DisjointSet {
  fn new(n: usize) -> Self {
    Self { parent: (0..n).collect() }
  }

  fn find(&mut self, i: usize) -> usize {
    let mut root = i;
    while self.parent[root] != root {
      root = self.parent[root];
    }
    let mut node = i;
    while self.parent[node] != root {
      let next = self.parent[node];
      self.parent[node] = root;
      node = next;
    }
    root
  }

  fn union(&mut self, a: usize, b: usize) {
    let (root_a, root_b) = (self.find(a), self.find(b));
    if root_a != root_b {
      self.parent[root_a.max(root_b)] = root_a.min(root_b);
    }
  }
}
