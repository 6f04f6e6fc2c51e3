//! Cluster summarization through a generative text service.
//!
//! Every cluster gets exactly one `ClusterSummary`. Service failures and
//! unparseable output are retried per cluster; once retries run out the
//! cluster is reported with a sentinel summary instead of failing the batch.

pub mod client;
pub mod gemini;
pub mod groq;
pub mod prompt;
pub mod response;

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub use client::{SummarizationClient, SummarizationError};
pub use response::SummaryFields;

use crate::config::{Provider, SummarizerSettings};
use crate::error::PipelineError;
use crate::model::{Category, Cluster, ClusterSummary};
use crate::retry::RetryPolicy;

pub const FAILED_LABEL: &str = "Error: Failed to Summarize";

type CacheKey = (Vec<String>, Option<String>);

pub struct Summarizer {
  client: Arc<dyn SummarizationClient>,
  retry: RetryPolicy,
  concurrency: usize,
  cache: Mutex<HashMap<CacheKey, SummaryFields>>,
}

impl Summarizer {
  pub fn new(client: Arc<dyn SummarizationClient>, settings: &SummarizerSettings) -> Self {
    Self::with_policy(
      client,
      RetryPolicy::new(settings.max_retries, settings.retry_delay()),
      settings.concurrency,
    )
  }

  pub fn with_policy(
    client: Arc<dyn SummarizationClient>,
    retry: RetryPolicy,
    concurrency: usize,
  ) -> Self {
    Self { client, retry, concurrency: concurrency.max(1), cache: Mutex::new(HashMap::new()) }
  }

  /// Summarizes one cluster. Never fails: exhausted retries yield the
  /// `FAILED_LABEL` sentinel carrying the last error in `reasoning`.
  pub async fn summarize(&self, texts: &[String], context: Option<&str>) -> ClusterSummary {
    let context = context.map(str::trim).filter(|c| !c.is_empty());
    let key: CacheKey = (texts.to_vec(), context.map(str::to_string));

    if let Some(fields) = self.cached(&key) {
      debug!("Summary cache hit for cluster of {}", texts.len());
      return assemble(fields, texts);
    }

    let prompt = prompt::build_prompt(texts, context);
    let outcome = self
      .retry
      .run(|attempt| {
        let prompt = prompt.as_str();
        let client = self.client.as_ref();
        async move {
          debug!("Summarizing cluster of {} (attempt {attempt})", texts.len());
          let text = client
            .complete(prompt)
            .await
            .map_err(|e| PipelineError::transient_service(e.to_string()))?;
          response::parse_summary(&text).inspect_err(|e| {
            warn!("{e}; response started with {:?}", excerpt(&text));
          })
        }
      })
      .await;

    match outcome {
      Ok(fields) => {
        if let Ok(mut cache) = self.cache.lock() {
          cache.insert(key, fields.clone());
        }
        assemble(fields, texts)
      }
      Err(exhausted) => {
        error!(
          "Giving up on cluster of {} after {} attempts: {}",
          texts.len(),
          exhausted.attempts,
          exhausted.last_error
        );
        let fields = SummaryFields {
          cluster_label: FAILED_LABEL.to_string(),
          category: Category::Other,
          priority_score: 1,
          reasoning: format!(
            "Summarization failed after {} attempts: {}",
            exhausted.attempts, exhausted.last_error
          ),
          issue_keys: Vec::new(),
        };
        assemble(fields, texts)
      }
    }
  }

  /// Summarizes every cluster, at most `concurrency` at a time, and returns
  /// them ordered by priority then volume, highest first.
  pub async fn summarize_all(
    &self,
    clusters: &[Cluster],
    context: Option<&str>,
  ) -> Vec<ClusterSummary> {
    info!("Summarizing {} clusters", clusters.len());

    let mut summaries: Vec<ClusterSummary> = stream::iter(clusters)
      .map(|cluster| self.summarize(&cluster.member_texts, context))
      .buffered(self.concurrency)
      .collect()
      .await;

    sort_summaries(&mut summaries);
    summaries
  }

  fn cached(&self, key: &CacheKey) -> Option<SummaryFields> {
    self.cache.lock().ok().and_then(|cache| cache.get(key).cloned())
  }
}

/// Stable sort, descending by `(priority_score, request_count)`.
pub fn sort_summaries(summaries: &mut [ClusterSummary]) {
  summaries.sort_by(|a, b| {
    (b.priority_score, b.request_count).cmp(&(a.priority_score, a.request_count))
  });
}

fn assemble(fields: SummaryFields, texts: &[String]) -> ClusterSummary {
  ClusterSummary {
    cluster_label: fields.cluster_label,
    category: fields.category,
    priority_score: fields.priority_score,
    reasoning: fields.reasoning,
    issue_keys: fields.issue_keys,
    request_count: texts.len(),
    feedback_text: ClusterSummary::join_feedback(texts),
  }
}

fn excerpt(text: &str) -> String {
  const LIMIT: usize = 120;
  match text.char_indices().nth(LIMIT) {
    Some((cut, _)) => format!("{}...", &text[..cut]),
    None => text.to_string(),
  }
}

/// Environment variable holding the credentials for `provider`.
pub fn api_key_variable(provider: Provider) -> &'static str {
  match provider {
    Provider::Gemini => "GOOGLE_API_KEY",
    Provider::Groq => "GROQ_API_KEY",
  }
}

/// Builds the HTTP client for the configured provider.
pub fn client_from_settings(
  settings: &SummarizerSettings,
  api_key: Option<String>,
) -> Result<Arc<dyn SummarizationClient>, SummarizationError> {
  let variable = api_key_variable(settings.provider);
  let api_key = api_key
    .filter(|key| !key.trim().is_empty())
    .ok_or(SummarizationError::MissingCredentials { variable })?;
  let timeout = std::time::Duration::from_secs(settings.timeout_secs);

  let client: Arc<dyn SummarizationClient> = match settings.provider {
    Provider::Gemini => Arc::new(gemini::GeminiClient::new(
      api_key,
      settings.model_name(),
      settings.temperature,
      timeout,
    )?),
    Provider::Groq => Arc::new(groq::GroqClient::new(
      api_key,
      settings.model_name(),
      settings.temperature,
      timeout,
    )?),
  };
  Ok(client)
}

#[cfg(test)]
mod tests {
  use super::client::MockSummarizationClient;
  use super::*;
  use std::time::Duration;

  fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn summarizer(mock: MockSummarizationClient) -> Summarizer {
    Summarizer::with_policy(Arc::new(mock), RetryPolicy::new(2, Duration::ZERO), 2)
  }

  fn summary(priority: u8, count: usize, label: &str) -> ClusterSummary {
    ClusterSummary {
      cluster_label: label.to_string(),
      category: Category::Other,
      priority_score: priority,
      reasoning: String::new(),
      issue_keys: Vec::new(),
      request_count: count,
      feedback_text: ClusterSummary::join_feedback(&vec!["x".to_string(); count]),
    }
  }

  #[tokio::test]
  async fn test_successful_summary_fills_counts() {
    let mut mock = MockSummarizationClient::new();
    mock.expect_complete().times(1).returning(|_| {
      Ok(r#"{"cluster_label":"Login Crashes","category":"Bug","priority_score":5,"reasoning":"Crash on login","issue_keys":["AUTH-1"]}"#.to_string())
    });

    let members = texts(&["App crashes on login", "Login keeps crashing for me"]);
    let result = summarizer(mock).summarize(&members, None).await;

    assert_eq!(result.cluster_label, "Login Crashes");
    assert_eq!(result.category, Category::Bug);
    assert_eq!(result.request_count, 2);
    assert_eq!(result.feedback_text, "App crashes on login | Login keeps crashing for me");
    assert_eq!(result.issue_keys, vec!["AUTH-1"]);
  }

  #[tokio::test]
  async fn test_always_failing_client_yields_sentinel() {
    let mut mock = MockSummarizationClient::new();
    mock.expect_complete().times(3).returning(|_| {
      Err(SummarizationError::Status { provider: "mock", status: 500, body: "boom".into() })
    });

    let members = texts(&["a", "b", "c"]);
    let result = summarizer(mock).summarize(&members, Some("ctx")).await;

    assert_eq!(result.cluster_label, FAILED_LABEL);
    assert_eq!(result.category, Category::Other);
    assert_eq!(result.priority_score, 1);
    assert!(result.issue_keys.is_empty());
    assert!(result.reasoning.contains("boom"), "{}", result.reasoning);
    assert_eq!(result.request_count, result.feedback_items().len());
  }

  #[tokio::test]
  async fn test_malformed_output_is_retried() {
    let mut mock = MockSummarizationClient::new();
    let mut seq = mockall::Sequence::new();
    mock
      .expect_complete()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok("I could not decide".to_string()));
    mock
      .expect_complete()
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(r#"{"cluster_label":"Dark Mode"}"#.to_string()));

    let result = summarizer(mock).summarize(&texts(&["Would love dark mode"]), None).await;
    assert_eq!(result.cluster_label, "Dark Mode");
    assert_eq!(result.priority_score, 1);
    assert_eq!(result.category, Category::Other);
  }

  #[tokio::test]
  async fn test_repeat_requests_hit_cache() {
    let mut mock = MockSummarizationClient::new();
    mock
      .expect_complete()
      .times(2)
      .returning(|_| Ok(r#"{"cluster_label":"Cached"}"#.to_string()));
    let summarizer = summarizer(mock);
    let members = texts(&["same text"]);

    summarizer.summarize(&members, Some("ctx")).await;
    let again = summarizer.summarize(&members, Some(" ctx ")).await;
    assert_eq!(again.cluster_label, "Cached");

    // Different context is a different request
    summarizer.summarize(&members, None).await;
  }

  #[tokio::test]
  async fn test_failures_are_not_cached() {
    let mut mock = MockSummarizationClient::new();
    mock
      .expect_complete()
      .times(6)
      .returning(|_| Err(SummarizationError::EmptyResponse { provider: "mock" }));
    let summarizer = summarizer(mock);
    let members = texts(&["flaky"]);

    assert_eq!(summarizer.summarize(&members, None).await.cluster_label, FAILED_LABEL);
    assert_eq!(summarizer.summarize(&members, None).await.cluster_label, FAILED_LABEL);
  }

  #[tokio::test]
  async fn test_one_failing_cluster_does_not_sink_the_batch() {
    let mut mock = MockSummarizationClient::new();
    mock.expect_complete().returning(|prompt| {
      if prompt.contains("poison") {
        Err(SummarizationError::Http { provider: "mock", message: "timeout".into() })
      } else {
        Ok(r#"{"cluster_label":"Fine","priority_score":3}"#.to_string())
      }
    });

    let clusters = vec![
      Cluster { id: 0, member_texts: texts(&["poison pill"]) },
      Cluster { id: 1, member_texts: texts(&["healthy", "also healthy"]) },
    ];
    let summaries = summarizer(mock).summarize_all(&clusters, None).await;

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].cluster_label, "Fine");
    assert_eq!(summaries[1].cluster_label, FAILED_LABEL);
  }

  #[test]
  fn test_sort_by_priority_then_volume_is_stable() {
    let mut summaries = vec![
      summary(2, 10, "p2"),
      summary(5, 3, "p5-small"),
      summary(5, 7, "p5-large"),
      summary(1, 1, "p1"),
      summary(2, 10, "p2-later"),
    ];
    sort_summaries(&mut summaries);

    let labels: Vec<_> = summaries.iter().map(|s| s.cluster_label.as_str()).collect();
    assert_eq!(labels, vec!["p5-large", "p5-small", "p2", "p2-later", "p1"]);
  }

  #[test]
  fn test_missing_api_key_is_reported() {
    let settings = SummarizerSettings { provider: Provider::Groq, ..Default::default() };
    match client_from_settings(&settings, Some("  ".to_string())) {
      Err(SummarizationError::MissingCredentials { variable }) => {
        assert_eq!(variable, "GROQ_API_KEY")
      }
      other => panic!("Expected MissingCredentials, got: {:?}", other.map(|c| c.name())),
    }
  }

  #[test]
  fn test_client_follows_provider() {
    let settings = SummarizerSettings::default();
    let client = client_from_settings(&settings, Some("key".to_string())).unwrap();
    assert_eq!(client.name(), "gemini");
  }
}
