//! Deterministic text cleanup applied before embedding.

use once_cell::sync::Lazy;
use regex::Regex;

// Symbols that show up inside SDK names and issue keys ("c++", "c#", "sdk-42").
static DISALLOWED: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s+\-#_.]").expect("normalizer pattern is valid"));
static WHITESPACE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Lower-case, drop punctuation outside the allow-list, collapse whitespace, trim.
pub fn clean(text: &str) -> String {
  let lowered = text.to_lowercase();
  let stripped = DISALLOWED.replace_all(&lowered, "");
  WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}
