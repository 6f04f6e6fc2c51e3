//! Keyword-based urgency scoring for dealblocker issues.

use crate::model::IssueRecord;

const URGENT_MARKERS: [&str; 3] = ["urgent", "critical", "blocker"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealblockerSummary {
  pub issue_key: String,
  pub summary: String,
  pub description: Option<String>,
  pub urgency_score: u8,
  pub urgency_reason: &'static str,
  pub passthrough: Vec<(String, String)>,
}

/// Score and reason for a single description.
pub fn assess(description: Option<&str>) -> (u8, &'static str) {
  let text = description.unwrap_or_default().to_lowercase();

  if URGENT_MARKERS.iter().any(|marker| text.contains(marker)) {
    (5, "Contains urgency markers (urgent/critical/blocker)")
  } else if text.contains("delay") {
    (4, "Mentions delay or time sensitivity")
  } else {
    (3, "Normal priority")
  }
}

pub fn summarize_dealblockers(issues: &[IssueRecord]) -> Vec<DealblockerSummary> {
  issues
    .iter()
    .map(|issue| {
      let (urgency_score, urgency_reason) = assess(issue.description.as_deref());
      DealblockerSummary {
        issue_key: issue.issue_key.clone(),
        summary: issue.summary.clone(),
        description: issue.description.clone(),
        urgency_score,
        urgency_reason,
        passthrough: issue.passthrough.clone(),
      }
    })
    .collect()
}
