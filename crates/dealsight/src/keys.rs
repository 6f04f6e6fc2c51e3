//! Parsing of the `issue_keys` cell, which arrives in whatever shape the
//! upstream table left it: a JSON array, a stringified Python list, a
//! comma-separated string, blank, or "nan".

use tracing::warn;

use crate::error::{PipelineError, Result};

const EMPTY_MARKERS: [&str; 4] = ["nan", "none", "null", "[]"];

/// Strict parse. Malformed input is a `ParsePartialFailure`.
pub fn try_parse_issue_keys(raw: &str) -> Result<Vec<String>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || EMPTY_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m)) {
    return Ok(Vec::new());
  }

  let keys = if trimmed.starts_with('[') || trimmed.starts_with('{') {
    parse_list(trimmed)?
  } else {
    trimmed.split(',').map(|item| unquote(item.trim())).collect::<Result<Vec<_>>>()?
  };

  Ok(dedupe(keys))
}

/// Lenient parse: a malformed value is logged and treated as no keys.
pub fn parse_issue_keys(raw: &str) -> Vec<String> {
  match try_parse_issue_keys(raw) {
    Ok(keys) => keys,
    Err(e) => {
      warn!("{e}; treating as no issue keys");
      Vec::new()
    }
  }
}

fn parse_list(trimmed: &str) -> Result<Vec<String>> {
  if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
    return keys_from_json(&value);
  }

  let inner = trimmed
    .strip_prefix('[')
    .and_then(|rest| rest.strip_suffix(']'))
    .ok_or_else(|| malformed(trimmed, "unterminated list"))?;

  if inner.trim().is_empty() {
    return Ok(Vec::new());
  }
  inner.split(',').map(|item| unquote(item.trim())).collect()
}

/// Accepts an array of strings (or a single string) from already decoded JSON.
pub fn keys_from_json(value: &serde_json::Value) -> Result<Vec<String>> {
  use serde_json::Value;

  match value {
    Value::Null => Ok(Vec::new()),
    Value::String(s) => try_parse_issue_keys(s),
    Value::Array(items) => {
      let keys = items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| match item {
          Value::String(s) => Ok(s.trim().to_string()),
          other => Err(malformed(&other.to_string(), "list item is not a string")),
        })
        .collect::<Result<Vec<_>>>()?;
      Ok(dedupe(keys))
    }
    other => Err(malformed(&other.to_string(), "expected a list of keys")),
  }
}

fn unquote(item: &str) -> Result<String> {
  let first = item.chars().next();
  let last = item.chars().last();
  match (first, last) {
    (Some(q @ ('\'' | '"')), Some(end)) if item.len() >= 2 && end == q => {
      Ok(item[1..item.len() - 1].trim().to_string())
    }
    (Some('\'' | '"'), _) | (_, Some('\'' | '"')) => Err(malformed(item, "unbalanced quotes")),
    _ => Ok(item.to_string()),
  }
}

fn dedupe(keys: Vec<String>) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  keys.into_iter().filter(|key| !key.is_empty() && seen.insert(key.clone())).collect()
}

fn malformed(raw: &str, reason: &str) -> PipelineError {
  PipelineError::parse_partial_failure("issue_keys", format!("{reason} in {raw:?}"))
}
