//! Operator-tunable settings.
//!
//! Settings come from an optional YAML file. Every field has a default, so a
//! partial file (or none at all) is valid. Credentials are never read from
//! the file; they come from the environment through the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Cosine distance above which clusters are no longer merged.
pub const DISTANCE_THRESHOLD: f32 = 0.35;
/// Minimum similarity for a semantic cluster-to-issue match.
pub const SIMILARITY_THRESHOLD: f32 = 0.65;

pub const DEFAULT_CONFIG_FILE: &str = "dealsight.yaml";

/// Upper bound for `summarizer.retry_delay_secs`.
pub const MAX_RETRY_DELAY_SECS: f64 = 300.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub clustering: ClusteringSettings,
  #[serde(default)]
  pub linking: LinkingSettings,
  #[serde(default)]
  pub summarizer: SummarizerSettings,
  #[serde(default)]
  pub embedding: EmbeddingSettings,
  #[serde(default)]
  pub jira: JiraSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSettings {
  /// Lower values yield many tight clusters, higher values few loose ones
  #[serde(default = "default_distance_threshold")]
  pub distance_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkingSettings {
  #[serde(default = "default_similarity_threshold")]
  pub similarity_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
  Gemini,
  Groq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizerSettings {
  #[serde(default = "default_provider")]
  pub provider: Provider,
  /// Provider default when unset
  #[serde(default)]
  pub model: Option<String>,
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  #[serde(default = "default_retry_delay_secs")]
  pub retry_delay_secs: f64,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Cluster summaries in flight at once
  #[serde(default = "default_concurrency")]
  pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
  #[serde(default = "default_model_repo")]
  pub model_repo: String,
  #[serde(default = "default_model_file")]
  pub model_file: String,
  #[serde(default = "default_tokenizer_file")]
  pub tokenizer_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraSettings {
  /// Falls back to JIRA_BASE_URL
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default = "default_max_results")]
  pub max_results: u32,
  #[serde(default = "default_jira_fields")]
  pub fields: Vec<String>,
}

fn default_distance_threshold() -> f32 {
  DISTANCE_THRESHOLD
}
fn default_similarity_threshold() -> f32 {
  SIMILARITY_THRESHOLD
}
fn default_provider() -> Provider {
  Provider::Gemini
}
fn default_max_retries() -> u32 {
  2
}
fn default_retry_delay_secs() -> f64 {
  2.0
}
fn default_temperature() -> f32 {
  0.2
}
fn default_timeout_secs() -> u64 {
  60
}
fn default_concurrency() -> usize {
  4
}
fn default_model_repo() -> String {
  "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_model_file() -> String {
  "onnx/model.onnx".to_string()
}
fn default_tokenizer_file() -> String {
  "tokenizer.json".to_string()
}
fn default_max_results() -> u32 {
  200
}
fn default_jira_fields() -> Vec<String> {
  connectors::jira::default_fields()
}

impl Default for ClusteringSettings {
  fn default() -> Self {
    Self { distance_threshold: default_distance_threshold() }
  }
}

impl Default for LinkingSettings {
  fn default() -> Self {
    Self { similarity_threshold: default_similarity_threshold() }
  }
}

impl Default for SummarizerSettings {
  fn default() -> Self {
    Self {
      provider: default_provider(),
      model: None,
      max_retries: default_max_retries(),
      retry_delay_secs: default_retry_delay_secs(),
      temperature: default_temperature(),
      timeout_secs: default_timeout_secs(),
      concurrency: default_concurrency(),
    }
  }
}

impl Default for EmbeddingSettings {
  fn default() -> Self {
    Self {
      model_repo: default_model_repo(),
      model_file: default_model_file(),
      tokenizer_file: default_tokenizer_file(),
    }
  }
}

impl Default for JiraSettings {
  fn default() -> Self {
    Self { base_url: None, max_results: default_max_results(), fields: default_jira_fields() }
  }
}

impl SummarizerSettings {
  pub fn model_name(&self) -> &str {
    match (&self.model, self.provider) {
      (Some(model), _) => model,
      (None, Provider::Gemini) => "gemini-flash-latest",
      (None, Provider::Groq) => "llama-3.1-8b-instant",
    }
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::try_from_secs_f64(self.retry_delay_secs.clamp(0.0, MAX_RETRY_DELAY_SECS))
      .unwrap_or_default()
  }
}

impl Settings {
  /// Loads settings from `path`, or from `dealsight.yaml` in the working
  /// directory when no path is given and that file exists.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let resolved: Option<PathBuf> = match path {
      Some(path) => Some(path.to_path_buf()),
      None => {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
      }
    };

    let settings = match resolved {
      Some(path) => Self::load_from_file(&path)?,
      None => Self::default(),
    };

    settings.validate()?;
    Ok(settings)
  }

  pub fn load_from_file(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self> {
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(content)
      .map_err(|e| PipelineError::validation(format!("invalid configuration: {e}")))
  }

  pub fn validate(&self) -> Result<()> {
    let distance = self.clustering.distance_threshold;
    if !(distance > 0.0 && distance <= 2.0) {
      return Err(PipelineError::validation(format!(
        "clustering.distance_threshold must be in (0, 2], got {distance}"
      )));
    }

    validate_similarity_threshold(self.linking.similarity_threshold)?;

    let delay = self.summarizer.retry_delay_secs;
    if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&delay) {
      return Err(PipelineError::validation(format!(
        "summarizer.retry_delay_secs must be in [0, {MAX_RETRY_DELAY_SECS}], got {delay}"
      )));
    }

    if self.summarizer.concurrency == 0 {
      return Err(PipelineError::validation("summarizer.concurrency must be at least 1"));
    }

    Ok(())
  }
}

pub fn validate_similarity_threshold(threshold: f32) -> Result<()> {
  if (0.0..=1.0).contains(&threshold) {
    Ok(())
  } else {
    Err(PipelineError::validation(format!(
      "similarity threshold must be in [0, 1], got {threshold}"
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_defaults_match_documented_constants() {
    let settings = Settings::default();
    assert_eq!(settings.clustering.distance_threshold, 0.35);
    assert_eq!(settings.linking.similarity_threshold, 0.65);
    assert_eq!(settings.summarizer.max_retries, 2);
    assert_eq!(settings.summarizer.retry_delay(), Duration::from_secs(2));
    assert_eq!(settings.summarizer.provider, Provider::Gemini);
    assert_eq!(settings.jira.max_results, 200);
    assert!(settings.validate().is_ok());
  }

  #[test]
  fn test_partial_yaml_keeps_other_defaults() -> Result<()> {
    let settings = Settings::from_yaml(
      "clustering:\n  distance_threshold: 0.5\nsummarizer:\n  provider: groq\n",
    )?;
    assert_eq!(settings.clustering.distance_threshold, 0.5);
    assert_eq!(settings.summarizer.provider, Provider::Groq);
    assert_eq!(settings.summarizer.model_name(), "llama-3.1-8b-instant");
    assert_eq!(settings.linking.similarity_threshold, SIMILARITY_THRESHOLD);
    Ok(())
  }

  #[test]
  fn test_empty_yaml_is_default() -> Result<()> {
    assert_eq!(Settings::from_yaml("  \n")?, Settings::default());
    Ok(())
  }

  #[test]
  fn test_explicit_model_overrides_provider_default() {
    let settings =
      SummarizerSettings { model: Some("gemini-2.0-pro".to_string()), ..Default::default() };
    assert_eq!(settings.model_name(), "gemini-2.0-pro");
  }

  #[test]
  fn test_invalid_yaml_is_validation_error() {
    let result = Settings::from_yaml("clustering: [not, a, map]");
    assert!(matches!(result, Err(PipelineError::Validation { .. })));
  }

  #[test]
  fn test_out_of_range_thresholds_rejected() {
    let mut settings = Settings::default();
    settings.linking.similarity_threshold = 1.5;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.clustering.distance_threshold = 0.0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.summarizer.concurrency = 0;
    assert!(settings.validate().is_err());
  }

  #[test]
  fn test_jira_fields_default_to_connector_list() {
    let settings = Settings::default();
    assert_eq!(settings.jira.fields, connectors::jira::default_fields());
    assert!(settings.jira.fields.iter().any(|field| field == connectors::jira::ARR_FIELD));
  }

  #[test]
  fn test_unbounded_retry_delay_is_validation_error() -> Result<()> {
    for yaml in [".inf", ".nan", "-1.0", "1.0e12"] {
      let settings = Settings::from_yaml(&format!("summarizer:\n  retry_delay_secs: {yaml}\n"))?;
      match settings.validate() {
        Err(PipelineError::Validation { message }) => {
          assert!(message.contains("retry_delay_secs"), "{message}")
        }
        other => panic!("Expected Validation for {yaml}, got: {other:?}"),
      }
      assert!(settings.summarizer.retry_delay() <= Duration::from_secs(300));
    }
    Ok(())
  }

  #[test]
  fn test_load_from_explicit_path() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("custom.yaml");
    std::fs::write(&path, "linking:\n  similarity_threshold: 0.7\n")?;

    let settings = Settings::load(Some(&path))?;
    assert_eq!(settings.linking.similarity_threshold, 0.7);
    Ok(())
  }

  #[test]
  fn test_load_missing_explicit_path_fails() {
    let result = Settings::load(Some(Path::new("/definitely/not/here.yaml")));
    assert!(matches!(result, Err(PipelineError::Io(_))));
  }
}
