use thiserror::Error;

/// Failures surfaced by the feedback pipeline.
///
/// `Validation` and `FatalInitialization` stop a run and reach the caller.
/// `TransientService` and `ParsePartialFailure` are produced per item and are
/// converted into degraded values before they leave the stage that raised them.
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("Invalid input: {message}")]
  Validation { message: String },

  #[error("Embedding model could not be initialized: {message}")]
  FatalInitialization { message: String },

  #[error("Embedding failed: {message}")]
  Embedding { message: String },

  #[error("Summarization service failed: {message}")]
  TransientService { message: String },

  #[error("Could not parse {what}: {message}")]
  ParsePartialFailure { what: String, message: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),
}

impl PipelineError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation { message: message.into() }
  }

  pub fn fatal_initialization(message: impl Into<String>) -> Self {
    Self::FatalInitialization { message: message.into() }
  }

  pub fn embedding(message: impl Into<String>) -> Self {
    Self::Embedding { message: message.into() }
  }

  pub fn transient_service(message: impl Into<String>) -> Self {
    Self::TransientService { message: message.into() }
  }

  pub fn parse_partial_failure(what: impl Into<String>, message: impl Into<String>) -> Self {
    Self::ParsePartialFailure { what: what.into(), message: message.into() }
  }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
