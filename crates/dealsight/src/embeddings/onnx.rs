//! Sentence-transformer embeddings through ONNX Runtime.

use async_trait::async_trait;
use hf_hub::api::tokio::Api;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{PipelineError, Result};

// Position embedding limit of BERT-style encoders.
const MAX_SEQUENCE_LENGTH: usize = 512;

struct ModelFiles {
  tokenizer_file: PathBuf,
  model_path: PathBuf,
}

pub struct OnnxEmbedder {
  session: Mutex<Session>,
  tokenizer: Tokenizer,
  input_names: Vec<String>,
}

// Model initialization
#[cfg(not(tarpaulin_include))]
impl OnnxEmbedder {
  /// Downloads (or reuses the cached copy of) the model and tokenizer and
  /// builds an inference session. Any failure here is fatal for the run.
  pub async fn load(settings: &EmbeddingSettings) -> Result<Self> {
    info!("Loading embedding model {}", settings.model_repo);

    let files = Self::download_model(settings).await?;
    let tokenizer = Tokenizer::from_file(&files.tokenizer_file).map_err(|e| {
      PipelineError::fatal_initialization(format!("Failed to load tokenizer: {e}"))
    })?;
    let session = Self::load_session(&files.model_path)?;
    let input_names = session.inputs.iter().map(|input| input.name.to_string()).collect();

    info!("Embedding model loaded");
    Ok(Self { session: Mutex::new(session), tokenizer, input_names })
  }

  async fn download_model(settings: &EmbeddingSettings) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| {
      PipelineError::fatal_initialization(format!("HF API initialization failed: {e}"))
    })?;
    let repo = api.model(settings.model_repo.clone());

    let tokenizer_file = repo.get(&settings.tokenizer_file).await.map_err(|e| {
      PipelineError::fatal_initialization(format!("Failed to download tokenizer: {e}"))
    })?;
    let model_path = repo.get(&settings.model_file).await.map_err(|e| {
      PipelineError::fatal_initialization(format!("Failed to download ONNX model: {e}"))
    })?;

    Ok(ModelFiles { tokenizer_file, model_path })
  }

  fn load_session(model_path: &std::path::Path) -> Result<Session> {
    Session::builder()
      .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level1))
      .and_then(|mut builder| builder.commit_from_file(model_path))
      .map_err(|e| PipelineError::fatal_initialization(format!("Failed to load ONNX model: {e}")))
  }
}

// Inference
impl OnnxEmbedder {
  fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
    let encoding = self
      .tokenizer
      .encode(text, true)
      .map_err(|e| PipelineError::embedding(format!("Tokenization failed: {e}")))?;

    let len = encoding.get_ids().len().min(MAX_SEQUENCE_LENGTH);
    if encoding.get_ids().len() > MAX_SEQUENCE_LENGTH {
      warn!("Truncating {} tokens to {MAX_SEQUENCE_LENGTH}", encoding.get_ids().len());
    }
    let ids = &encoding.get_ids()[..len];
    let mask = &encoding.get_attention_mask()[..len];
    let type_ids = &encoding.get_type_ids()[..len];

    let inputs = prepare_inputs(&self.input_names, ids, mask, type_ids)?;

    let mut session =
      self.session.lock().map_err(|_| PipelineError::embedding("Failed to lock model session"))?;
    let outputs = session.run(inputs).map_err(|e| PipelineError::embedding(e.to_string()))?;

    let hidden = outputs
      .get("last_hidden_state")
      .or_else(|| outputs.get("token_embeddings"))
      .ok_or_else(|| {
        PipelineError::embedding("No output found from model - expected 'last_hidden_state'")
      })?;
    let (shape, data) =
      hidden.try_extract_tensor::<f32>().map_err(|e| PipelineError::embedding(e.to_string()))?;

    mean_pool(shape.as_ref(), data, mask)
  }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    debug!("Running ONNX inference for {} texts", texts.len());
    texts.iter().map(|text| self.embed_one(text)).collect()
  }
}

fn prepare_inputs(
  input_names: &[String],
  ids: &[u32],
  mask: &[u32],
  type_ids: &[u32],
) -> Result<HashMap<String, Value>> {
  let mut inputs = HashMap::new();
  inputs.insert("input_ids".to_string(), to_tensor(ids)?);
  inputs.insert("attention_mask".to_string(), to_tensor(mask)?);

  if input_names.iter().any(|name| name == "token_type_ids") {
    inputs.insert("token_type_ids".to_string(), to_tensor(type_ids)?);
  }

  Ok(inputs)
}

fn to_tensor(values: &[u32]) -> Result<Value> {
  let values: Vec<i64> = values.iter().map(|&x| x as i64).collect();
  let array = Array2::from_shape_vec((1, values.len()), values)
    .map_err(|e| PipelineError::embedding(e.to_string()))?;
  let tensor: Value =
    Value::from_array(array).map_err(|e| PipelineError::embedding(e.to_string()))?.into();
  Ok(tensor)
}

/// Averages token vectors of a `[1, seq, hidden]` output, counting only
/// positions the attention mask marks as real tokens.
pub fn mean_pool(shape: &[i64], data: &[f32], mask: &[u32]) -> Result<Vec<f32>> {
  if shape.len() != 3 {
    return Err(PipelineError::embedding(format!("unexpected output shape {shape:?}")));
  }
  let seq_length = shape[1] as usize;
  let hidden_size = shape[2] as usize;
  if data.len() < seq_length * hidden_size {
    return Err(PipelineError::embedding("output tensor shorter than its shape"));
  }

  let mut pooled = vec![0.0f32; hidden_size];
  let mut counted = 0usize;
  for token_idx in 0..seq_length {
    if mask.get(token_idx).copied().unwrap_or(1) == 0 {
      continue;
    }
    let start = token_idx * hidden_size;
    for (i, &value) in data[start..start + hidden_size].iter().enumerate() {
      pooled[i] += value;
    }
    counted += 1;
  }

  if counted > 0 {
    for value in pooled.iter_mut() {
      *value /= counted as f32;
    }
  }

  Ok(pooled)
}
