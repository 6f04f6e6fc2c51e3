//! Jira Cloud issue search.

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adf;
use crate::error::{ConnectorError, Result};

const SERVICE: &str = "jira";

pub const DEFAULT_MAX_RESULTS: u32 = 200;
// Upper bound Jira accepts for a single search page.
const MAX_RESULTS_LIMIT: u32 = 5000;

pub const ARR_FIELD: &str = "customfield_10016";
pub const DEAL_SIZE_FIELD: &str = "customfield_10015";

pub fn default_fields() -> Vec<String> {
  ["summary", "description", "reporter", "status", "priority", ARR_FIELD, DEAL_SIZE_FIELD]
    .iter()
    .map(|field| field.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
  pub base_url: String,
  pub email: String,
  pub api_token: String,
  pub max_results: u32,
  pub fields: Vec<String>,
}

impl JiraConfig {
  /// Reads `JIRA_BASE_URL`, `JIRA_EMAIL` and `JIRA_API_TOKEN`. An explicit
  /// base URL takes precedence over the environment.
  pub fn from_env(base_url: Option<String>) -> Result<Self> {
    let base_url = base_url
      .filter(|url| !url.trim().is_empty())
      .map_or_else(|| require_env("JIRA_BASE_URL"), Ok)?;

    Ok(Self {
      base_url,
      email: require_env("JIRA_EMAIL")?,
      api_token: require_env("JIRA_API_TOKEN")?,
      max_results: DEFAULT_MAX_RESULTS,
      fields: default_fields(),
    })
  }

  pub fn with_max_results(mut self, max_results: u32) -> Self {
    self.max_results = max_results;
    self
  }

  pub fn with_fields(mut self, fields: Vec<String>) -> Self {
    if !fields.is_empty() {
      self.fields = fields;
    }
    self
  }

  fn effective_max_results(&self) -> u32 {
    if (1..=MAX_RESULTS_LIMIT).contains(&self.max_results) {
      self.max_results
    } else {
      warn!("maxResults {} out of range, using {DEFAULT_MAX_RESULTS}", self.max_results);
      DEFAULT_MAX_RESULTS
    }
  }
}

fn require_env(variable: &str) -> Result<String> {
  std::env::var(variable)
    .ok()
    .filter(|value| !value.trim().is_empty())
    .ok_or_else(|| ConnectorError::missing_config(variable))
}

/// One issue as returned by search, with the business fields flattened to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraIssue {
  pub key: String,
  pub summary: String,
  pub description: Option<String>,
  pub status: Option<String>,
  pub reporter: Option<String>,
  pub priority: Option<String>,
  pub arr: Option<String>,
  pub deal_size: Option<String>,
}

pub struct JiraClient {
  client: Client,
  config: JiraConfig,
}

impl JiraClient {
  pub fn new(config: JiraConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| ConnectorError::http(SERVICE, e.to_string()))?;
    Ok(Self { client, config })
  }

  /// Runs `jql` and returns the matching issues. No matches is an empty list.
  pub async fn search(&self, jql: &str) -> Result<Vec<JiraIssue>> {
    let url = format!("{}/rest/api/3/search/jql", self.config.base_url.trim_end_matches('/'));
    let payload = json!({
      "jql": jql,
      "maxResults": self.config.effective_max_results(),
      "fields": self.config.fields,
    });

    debug!("POST {url} jql={jql}");
    let response = self
      .client
      .post(&url)
      .basic_auth(&self.config.email, Some(&self.config.api_token))
      .header(ACCEPT, HeaderValue::from_static("application/json"))
      .json(&payload)
      .send()
      .await
      .map_err(|e| ConnectorError::http(SERVICE, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ConnectorError::status(SERVICE, status.as_u16(), body));
    }

    let data: Value = response
      .json()
      .await
      .map_err(|e| ConnectorError::unexpected_response(SERVICE, e.to_string()))?;
    let issues = data["issues"]
      .as_array()
      .ok_or_else(|| ConnectorError::unexpected_response(SERVICE, "no 'issues' array"))?;

    let parsed: Vec<JiraIssue> = issues.iter().filter_map(parse_issue).collect();
    info!("Fetched {} Jira issues", parsed.len());
    Ok(parsed)
  }
}

fn parse_issue(issue: &Value) -> Option<JiraIssue> {
  let Some(key) = issue["key"].as_str() else {
    warn!("Skipping Jira issue without a key");
    return None;
  };
  let fields = &issue["fields"];

  Some(JiraIssue {
    key: key.to_string(),
    summary: fields["summary"].as_str().unwrap_or_default().to_string(),
    description: description_text(&fields["description"]),
    status: field_text(&fields["status"]),
    reporter: field_text(&fields["reporter"]),
    priority: field_text(&fields["priority"]),
    arr: field_text(&fields[ARR_FIELD]),
    deal_size: field_text(&fields[DEAL_SIZE_FIELD]),
  })
}

fn description_text(value: &Value) -> Option<String> {
  let text = match value {
    Value::String(s) => s.clone(),
    Value::Object(_) => adf::to_plain_text(value),
    _ => return None,
  };
  let text = text.trim();
  (!text.is_empty()).then(|| text.to_string())
}

/// Text of a scalar, option, or user field.
fn field_text(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Object(map) => ["displayName", "name", "value"]
      .iter()
      .find_map(|name| map.get(*name).and_then(field_text)),
    Value::Array(items) => {
      let parts: Vec<String> = items.iter().filter_map(field_text).collect();
      (!parts.is_empty()).then(|| parts.join(", "))
    }
  }
}
