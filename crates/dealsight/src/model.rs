//! Typed records flowing through the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between member texts in `ClusterSummary::feedback_text`.
pub const FEEDBACK_DELIMITER: &str = " | ";

// Member texts never carry a pipe, so no two texts can form a delimiter where they meet.
const PIPE_SUBSTITUTE: &str = "/";

/// One raw feedback item, built by the caller from uploaded rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRow {
  pub text: String,
  pub source_columns: Vec<String>,
}

impl FeedbackRow {
  pub fn new(text: impl Into<String>, source_columns: Vec<String>) -> Self {
    Self { text: text.into(), source_columns }
  }

  /// Joins the selected cells with a single space, skipping blank cells and
  /// the literal "nan" that spreadsheet exports leave behind.
  pub fn from_cells<'a>(
    cells: impl IntoIterator<Item = &'a str>,
    source_columns: Vec<String>,
  ) -> Self {
    let text = cells
      .into_iter()
      .map(str::trim)
      .filter(|cell| !cell.is_empty() && !cell.eq_ignore_ascii_case("nan"))
      .collect::<Vec<_>>()
      .join(" ");
    Self { text, source_columns }
  }
}

/// Feedback texts grouped together by the cluster engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
  /// Opaque id, only meaningful inside one invocation.
  pub id: usize,
  /// Original (uncleaned) texts in input order.
  pub member_texts: Vec<String>,
}

impl Cluster {
  pub fn size(&self) -> usize {
    self.member_texts.len()
  }
}

/// Fixed set of categories a cluster can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
  Bug,
  FeatureRequest,
  UxIssue,
  Performance,
  SdkCoverage,
  Billing,
  Other,
}

impl Category {
  pub const ALL: [Category; 7] = [
    Category::Bug,
    Category::FeatureRequest,
    Category::UxIssue,
    Category::Performance,
    Category::SdkCoverage,
    Category::Billing,
    Category::Other,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Bug => "Bug",
      Category::FeatureRequest => "Feature Request",
      Category::UxIssue => "UX Issue",
      Category::Performance => "Performance",
      Category::SdkCoverage => "SDK Coverage",
      Category::Billing => "Billing",
      Category::Other => "Other",
    }
  }

  /// Case-insensitive match that ignores spaces, dashes and underscores.
  /// Unknown labels fall back to `Other`.
  pub fn parse_lenient(raw: &str) -> Category {
    let squashed: String = raw
      .chars()
      .filter(|c| !matches!(c, ' ' | '-' | '_' | '/'))
      .flat_map(char::to_lowercase)
      .collect();

    match squashed.as_str() {
      "bug" => Category::Bug,
      "featurerequest" | "feature" => Category::FeatureRequest,
      "uxissue" | "ux" | "uiux" => Category::UxIssue,
      "performance" => Category::Performance,
      "sdkcoverage" => Category::SdkCoverage,
      "billing" => Category::Billing,
      _ => Category::Other,
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Caller-facing, summarized view of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
  pub cluster_label: String,
  pub category: Category,
  /// 1 (low) to 5 (urgent).
  pub priority_score: u8,
  pub reasoning: String,
  pub issue_keys: Vec<String>,
  pub request_count: usize,
  pub feedback_text: String,
}

impl ClusterSummary {
  /// Joins member texts so that splitting on the delimiter yields exactly
  /// `member_texts.len()` pieces.
  pub fn join_feedback(member_texts: &[String]) -> String {
    member_texts
      .iter()
      .map(|text| text.replace('|', PIPE_SUBSTITUTE))
      .collect::<Vec<_>>()
      .join(FEEDBACK_DELIMITER)
  }

  pub fn feedback_items(&self) -> Vec<&str> {
    self.feedback_text.split(FEEDBACK_DELIMITER).collect()
  }
}

/// One row of the issue tracker. Business fields the core does not read are
/// carried through in their original column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
  pub issue_key: String,
  pub summary: String,
  pub description: Option<String>,
  pub passthrough: Vec<(String, String)>,
}

impl IssueRecord {
  pub fn new(issue_key: impl Into<String>, summary: impl Into<String>) -> Self {
    Self {
      issue_key: issue_key.into(),
      summary: summary.into(),
      description: None,
      passthrough: Vec::new(),
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.passthrough.push((name.into(), value.into()));
    self
  }

  pub fn field(&self, name: &str) -> Option<&str> {
    self.passthrough.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
  ExplicitKey,
  Semantic,
}

impl MatchType {
  pub fn as_str(&self) -> &'static str {
    match self {
      MatchType::ExplicitKey => "ExplicitKey",
      MatchType::Semantic => "Semantic",
    }
  }
}

impl fmt::Display for MatchType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A cluster matched to one issue.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
  pub cluster_label: String,
  pub reasoning: String,
  pub request_count: usize,
  pub matched_issue_key: String,
  pub matched_summary: String,
  pub match_type: MatchType,
  /// In [0, 1]; exactly 1.0 for explicit key matches.
  pub match_score: f32,
}
