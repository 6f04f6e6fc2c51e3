//! Groq client over its OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::client::{SummarizationClient, SummarizationError};

const PROVIDER: &str = "groq";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com";

const SYSTEM_PROMPT: &str =
  "You are a product feedback analyst. Respond with a single valid JSON object and nothing else.";

pub struct GroqClient {
  client: Client,
  base_url: String,
  api_key: String,
  model: String,
  temperature: f32,
}

impl GroqClient {
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

  fn headers(&self) -> Result<HeaderMap, SummarizationError> {
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", self.api_key.trim());
    headers.insert(
      AUTHORIZATION,
      HeaderValue::from_str(&auth).map_err(|_| SummarizationError::Malformed {
        provider: PROVIDER,
        message: "API key contains characters not allowed in a header".to_string(),
      })?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
  }
}

#[async_trait]
impl SummarizationClient for GroqClient {
  fn name(&self) -> &'static str {
    PROVIDER
  }

  async fn complete(&self, prompt: &str) -> Result<String, SummarizationError> {
    let url = format!("{}/openai/v1/chat/completions", self.base_url);
    let body = ChatRequest {
      model: &self.model,
      temperature: self.temperature,
      messages: vec![
        ChatMessage { role: "system", content: SYSTEM_PROMPT },
        ChatMessage { role: "user", content: prompt },
      ],
    };

    debug!("POST {url}");
    let response = self
      .client
      .post(&url)
      .headers(self.headers()?)
      .json(&body)
      .send()
      .await
      .map_err(|e| SummarizationError::Http { provider: PROVIDER, message: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
      return Err(SummarizationError::Status { provider: PROVIDER, status: status.as_u16(), body });
    }

    let parsed: ChatResponse = response
      .json()
      .await
      .map_err(|e| SummarizationError::Malformed { provider: PROVIDER, message: e.to_string() })?;

    let text = parsed
      .choices
      .into_iter()
      .find_map(|choice| choice.message.content)
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(SummarizationError::EmptyResponse { provider: PROVIDER });
    }
    Ok(text)
  }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  temperature: f32,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
  content: Option<String>,
}
