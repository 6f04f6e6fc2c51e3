use async_trait::async_trait;
use thiserror::Error;

/// Typed failure of one call to the generative service.
#[derive(Error, Debug)]
pub enum SummarizationError {
  #[error("request to {provider} failed: {message}")]
  Http { provider: &'static str, message: String },

  #[error("{provider} returned {status}: {body}")]
  Status { provider: &'static str, status: u16, body: String },

  #[error("{provider} returned no text")]
  EmptyResponse { provider: &'static str },

  #[error("{provider} response was not understood: {message}")]
  Malformed { provider: &'static str, message: String },

  #[error("missing credentials: set {variable}")]
  MissingCredentials { variable: &'static str },
}

/// Prompt in, raw text out. Authentication and endpoint choice belong to the
/// implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummarizationClient: Send + Sync {
  /// Short provider name used in logs.
  fn name(&self) -> &'static str;

  async fn complete(&self, prompt: &str) -> Result<String, SummarizationError>;
}
