//! Conversion of connector payloads into pipeline records.

use connectors::{JiraIssue, SlackMessage};

use crate::model::{FeedbackRow, IssueRecord};

pub fn issue_from_jira(issue: JiraIssue) -> IssueRecord {
  let mut record = IssueRecord::new(issue.key, issue.summary);
  if let Some(description) = issue.description {
    record = record.with_description(description);
  }

  let fields = [
    ("Status", issue.status),
    ("Reporter", issue.reporter),
    ("Priority", issue.priority),
    ("ARR", issue.arr),
    ("Deal Size", issue.deal_size),
  ];
  for (name, value) in fields {
    record = record.with_field(name, value.unwrap_or_default());
  }
  record
}

pub fn feedback_from_slack(channel: &str, message: SlackMessage) -> FeedbackRow {
  FeedbackRow::new(message.text, vec![format!("slack:{channel}")])
}
