//! Embedding provider shared by the cluster engine and the record linker.
//!
//! Loading a model is expensive, so the provider is constructed once and
//! handed to every stage by reference. The backing model is loaded lazily on
//! the first `embed` call; concurrent first callers wait on the same load.

#[cfg(feature = "ml-features")]
pub mod onnx;
pub mod similarity;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::error::{PipelineError, Result};

/// Maps texts to fixed-dimension vectors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

type Loader = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Embedder>>> + Send + Sync>;

pub struct EmbeddingProvider {
  loader: Loader,
  model: OnceCell<Arc<dyn Embedder>>,
}

impl EmbeddingProvider {
  /// Defers loading until the first `embed` call.
  pub fn lazy<F>(loader: F) -> Self
  where
    F: Fn() -> BoxFuture<'static, Result<Arc<dyn Embedder>>> + Send + Sync + 'static,
  {
    Self { loader: Box::new(loader), model: OnceCell::new() }
  }

  /// Wraps an already constructed embedder.
  pub fn ready(embedder: Arc<dyn Embedder>) -> Self {
    let model = OnceCell::new_with(Some(embedder));
    Self {
      loader: Box::new(|| {
        Box::pin(async { Err(PipelineError::fatal_initialization("embedder already loaded")) })
      }),
      model,
    }
  }

  /// Lazily loads the ONNX sentence-transformer described by `settings`.
  #[cfg(feature = "ml-features")]
  pub fn onnx(settings: crate::config::EmbeddingSettings) -> Self {
    Self::lazy(move || {
      let settings = settings.clone();
      Box::pin(async move {
        let model = onnx::OnnxEmbedder::load(&settings).await?;
        Ok(Arc::new(model) as Arc<dyn Embedder>)
      })
    })
  }

  #[cfg(not(feature = "ml-features"))]
  pub fn onnx(_settings: crate::config::EmbeddingSettings) -> Self {
    Self::lazy(|| {
      Box::pin(async {
        Err(PipelineError::fatal_initialization(
          "built without the ml-features feature; no embedding model available",
        ))
      })
    })
  }

  pub fn is_loaded(&self) -> bool {
    self.model.initialized()
  }

  async fn model(&self) -> Result<&Arc<dyn Embedder>> {
    self
      .model
      .get_or_try_init(|| async {
        info!("Initializing embedding model...");
        let loaded = (self.loader)().await;
        if let Err(e) = &loaded {
          error!("Embedding model failed to load: {e}");
        }
        loaded
      })
      .await
  }

  /// Embeds `texts` into unit-length vectors, one per input.
  pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }

    let model = self.model().await?;
    let vectors = model.embed(texts).await?;

    if vectors.len() != texts.len() {
      return Err(PipelineError::embedding(format!(
        "model returned {} vectors for {} texts",
        vectors.len(),
        texts.len()
      )));
    }

    debug!("Embedded {} texts", texts.len());
    Ok(vectors.into_iter().map(similarity::normalize).collect())
  }
}
