//! Recovery of the structured summary from free-form model output.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::keys;
use crate::model::Category;

pub const UNTITLED_LABEL: &str = "Untitled Cluster";

/// Fields the model is asked to produce. Missing ones take their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryFields {
  pub cluster_label: String,
  pub category: Category,
  pub priority_score: u8,
  pub reasoning: String,
  pub issue_keys: Vec<String>,
}

impl Default for SummaryFields {
  fn default() -> Self {
    Self {
      cluster_label: UNTITLED_LABEL.to_string(),
      category: Category::Other,
      priority_score: 1,
      reasoning: String::new(),
      issue_keys: Vec::new(),
    }
  }
}

/// Extracts the outermost `{ ... }` span and decodes it. Prose or code
/// fences around the object are ignored.
pub fn parse_summary(text: &str) -> Result<SummaryFields> {
  let object = extract_object(text)?;
  let mut fields = SummaryFields::default();

  if let Some(label) = string_field(&object, "cluster_label") {
    fields.cluster_label = label;
  }
  if let Some(category) = string_field(&object, "category") {
    fields.category = Category::parse_lenient(&category);
  }
  if let Some(priority) = object.get("priority_score").and_then(priority_from) {
    fields.priority_score = priority;
  }
  if let Some(reasoning) = string_field(&object, "reasoning") {
    fields.reasoning = reasoning;
  }
  if let Some(raw_keys) = object.get("issue_keys") {
    fields.issue_keys = keys::keys_from_json(raw_keys).unwrap_or_else(|e| {
      warn!("{e}; summary keeps no issue keys");
      Vec::new()
    });
  }

  Ok(fields)
}

fn extract_object(text: &str) -> Result<Map<String, Value>> {
  let (start, end) = match (text.find('{'), text.rfind('}')) {
    (Some(start), Some(end)) if start < end => (start, end),
    _ => return Err(malformed("no JSON object in response")),
  };

  match serde_json::from_str::<Value>(&text[start..=end]) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(_) => Err(malformed("response is not a JSON object")),
    Err(e) => Err(malformed(&e.to_string())),
  }
}

fn string_field(object: &Map<String, Value>, name: &str) -> Option<String> {
  match object.get(name)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn priority_from(value: &Value) -> Option<u8> {
  let raw = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().parse::<f64>().ok()?,
    _ => return None,
  };
  if !raw.is_finite() {
    return None;
  }
  Some(raw.round().clamp(1.0, 5.0) as u8)
}

fn malformed(message: &str) -> PipelineError {
  PipelineError::parse_partial_failure("summary response", message)
}
