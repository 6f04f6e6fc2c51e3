//! Slack channel history (`conversations.history`).

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConnectorError, Result};

const SERVICE: &str = "slack";
pub const DEFAULT_BASE_URL: &str = "https://slack.com";
pub const DEFAULT_LIMIT: u32 = 200;
// conversations.history caps a page at 1000 messages.
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackMessage {
  pub user: String,
  pub text: String,
  pub ts: Option<String>,
}

pub struct SlackClient {
  client: Client,
  base_url: String,
  token: String,
}

impl SlackClient {
  pub fn new(token: impl Into<String>) -> Result<Self> {
    let token = token.into();
    if token.trim().is_empty() {
      return Err(ConnectorError::missing_config("SLACK_BOT_TOKEN"));
    }
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| ConnectorError::http(SERVICE, e.to_string()))?;
    Ok(Self { client, base_url: DEFAULT_BASE_URL.to_string(), token })
  }

  /// Reads the token from `SLACK_BOT_TOKEN`.
  pub fn from_env() -> Result<Self> {
    Self::new(std::env::var("SLACK_BOT_TOKEN").unwrap_or_default())
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }

  /// Most recent messages in `channel`, newest first. Messages without text
  /// are dropped.
  pub async fn channel_history(&self, channel: &str, limit: u32) -> Result<Vec<SlackMessage>> {
    let url = format!("{}/api/conversations.history", self.base_url);
    let limit = limit.clamp(1, MAX_LIMIT);

    debug!("GET {url} channel={channel} limit={limit}");
    let response = self
      .client
      .get(&url)
      .bearer_auth(self.token.trim())
      .query(&[("channel", channel.to_string()), ("limit", limit.to_string())])
      .send()
      .await
      .map_err(|e| ConnectorError::http(SERVICE, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ConnectorError::status(SERVICE, status.as_u16(), body));
    }

    let history: HistoryResponse = response
      .json()
      .await
      .map_err(|e| ConnectorError::unexpected_response(SERVICE, e.to_string()))?;
    if !history.ok {
      let error = history.error.unwrap_or_else(|| "unknown_error".to_string());
      return Err(ConnectorError::slack(error));
    }

    let messages: Vec<SlackMessage> = history
      .messages
      .into_iter()
      .filter_map(|message| {
        let text = message.text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
        Some(SlackMessage {
          user: message.user.unwrap_or_else(|| "unknown".to_string()),
          text,
          ts: message.ts,
        })
      })
      .collect();

    info!("Fetched {} messages from Slack channel {channel}", messages.len());
    Ok(messages)
  }
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
  ok: bool,
  error: Option<String>,
  #[serde(default)]
  messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
  user: Option<String>,
  text: Option<String>,
  ts: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};

  #[tokio::test]
  async fn test_history_skips_blank_messages() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/conversations.history")
      .match_header("authorization", "Bearer xoxb-test")
      .match_query(Matcher::AllOf(vec![
        Matcher::UrlEncoded("channel".into(), "C123".into()),
        Matcher::UrlEncoded("limit".into(), "50".into()),
      ]))
      .with_status(200)
      .with_body(
        r#"{"ok": true, "messages": [
          {"user": "U1", "text": " Export is too slow ", "ts": "1.1"},
          {"user": "U2", "text": "   ", "ts": "1.2"},
          {"subtype": "channel_join", "ts": "1.3"},
          {"text": "Need SAML", "ts": "1.4"}
        ]}"#,
      )
      .create_async()
      .await;

    let client = SlackClient::new("xoxb-test").unwrap().with_base_url(server.url());
    let messages = client.channel_history("C123", 50).await.unwrap();

    mock.assert_async().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "Export is too slow");
    assert_eq!(messages[0].user, "U1");
    assert_eq!(messages[1].user, "unknown");
  }

  #[tokio::test]
  async fn test_not_ok_surfaces_slack_error() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("GET", "/api/conversations.history")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(r#"{"ok": false, "error": "channel_not_found"}"#)
      .create_async()
      .await;

    let client = SlackClient::new("xoxb-test").unwrap().with_base_url(server.url());
    match client.channel_history("C404", 10).await {
      Err(ConnectorError::Slack { error }) => assert_eq!(error, "channel_not_found"),
      other => panic!("Expected Slack error, got: {other:?}"),
    }
  }

  #[test]
  fn test_blank_token_rejected() {
    assert!(matches!(SlackClient::new("  "), Err(ConnectorError::MissingConfig { .. })));
  }
}
