//! Vector similarity helpers.

/// Cosine similarity between two embeddings. Mismatched dimensions and zero
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }

  let dot_product = dot(a, b);
  let magnitude_a = magnitude(a);
  let magnitude_b = magnitude(b);

  if magnitude_a == 0.0 || magnitude_b == 0.0 {
    0.0
  } else {
    dot_product / (magnitude_a * magnitude_b)
  }
}

/// `1 - cosine_similarity`, in [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
  (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn magnitude(vector: &[f32]) -> f32 {
  vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scales to unit length; zero vectors are returned unchanged.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
  let magnitude = magnitude(&vector);
  if magnitude > f32::EPSILON {
    for value in vector.iter_mut() {
      *value /= magnitude;
    }
  }
  vector
}
