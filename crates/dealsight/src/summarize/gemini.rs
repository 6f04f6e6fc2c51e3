//! Google Generative Language (`generateContent`) client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::client::{SummarizationClient, SummarizationError};

const PROVIDER: &str = "gemini";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
  client: Client,
  base_url: String,
  api_key: String,
  model: String,
  temperature: f32,
}

impl GeminiClient {
  pub fn new(
    api_key: impl Into<String>,
    model: impl Into<String>,
    temperature: f32,
    timeout: Duration,
  ) -> Result<Self, SummarizationError> {
    let client = Client::builder().timeout(timeout).build().map_err(|e| {
      SummarizationError::Http { provider: PROVIDER, message: e.to_string() }
    })?;

    Ok(Self {
      client,
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: api_key.into(),
      model: model.into(),
      temperature,
    })
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }
}

#[async_trait]
impl SummarizationClient for GeminiClient {
  fn name(&self) -> &'static str {
    PROVIDER
  }

  async fn complete(&self, prompt: &str) -> Result<String, SummarizationError> {
    let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
    let body = GenerateRequest {
      contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
      generation_config: GenerationConfig {
        temperature: self.temperature,
        response_mime_type: "application/json",
      },
    };

    debug!("POST {url}");
    let response = self
      .client
      .post(&url)
      .query(&[("key", self.api_key.trim())])
      .json(&body)
      .send()
      .await
      .map_err(|e| SummarizationError::Http { provider: PROVIDER, message: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
      return Err(SummarizationError::Status { provider: PROVIDER, status: status.as_u16(), body });
    }

    let parsed: GenerateResponse = response
      .json()
      .await
      .map_err(|e| SummarizationError::Malformed { provider: PROVIDER, message: e.to_string() })?;

    let text: String = parsed
      .candidates
      .into_iter()
      .next()
      .and_then(|candidate| candidate.content)
      .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(SummarizationError::EmptyResponse { provider: PROVIDER });
    }
    Ok(text)
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
  parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
  text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
  text: Option<String>,
}
