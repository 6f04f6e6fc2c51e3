//! CSV boundary: reading caller tables into typed records and writing the
//! result tables with their fixed column order.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::keys::parse_issue_keys;
use crate::model::{Category, ClusterSummary, FeedbackRow, IssueRecord, Link};
use crate::urgency::DealblockerSummary;

pub const CLUSTER_COLUMNS: [&str; 7] = [
  "cluster_label",
  "category",
  "priority_score",
  "request_count",
  "reasoning",
  "issue_keys",
  "feedback_text",
];

pub const LINK_COLUMNS: [&str; 7] = [
  "cluster_label",
  "feedback_reasoning",
  "request_count",
  "mapped_issue_key",
  "mapped_issue_summary",
  "match_type",
  "match_score",
];

pub const ISSUE_KEY_COLUMN: &str = "Issue Key";
pub const SUMMARY_COLUMN: &str = "Summary";
pub const DESCRIPTION_COLUMN: &str = "Description";

const TEXT_COLUMN_HINTS: [&str; 3] = ["feedback", "comment", "text"];

// Readers

/// Reads feedback from a CSV or, for any other extension, a plain text file
/// with one item per line.
pub fn read_feedback_file(path: &Path, columns: &[String]) -> Result<Vec<FeedbackRow>> {
  let file = std::fs::File::open(path)?;
  let is_csv = path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

  if is_csv {
    read_feedback_csv(file, columns)
  } else {
    if !columns.is_empty() {
      warn!("Ignoring --column for plain text input {}", path.display());
    }
    read_feedback_lines(BufReader::new(file))
  }
}

/// Reads the chosen text columns of every row. With no columns named, the
/// first header that looks like free text is used, else the first column.
pub fn read_feedback_csv<R: Read>(reader: R, columns: &[String]) -> Result<Vec<FeedbackRow>> {
  let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
  let headers = csv.headers()?.clone();
  if headers.is_empty() {
    return Err(PipelineError::validation("feedback table has no columns"));
  }

  let selected: Vec<String> = if columns.is_empty() {
    vec![detect_text_column(&headers)]
  } else {
    columns.to_vec()
  };

  let indices = selected
    .iter()
    .map(|name| {
      column_index(&headers, name)
        .ok_or_else(|| PipelineError::validation(format!("feedback table has no column '{name}'")))
    })
    .collect::<Result<Vec<_>>>()?;
  debug!("Reading feedback from columns {selected:?}");

  let mut rows = Vec::new();
  for record in csv.records() {
    let record = record?;
    let cells = indices.iter().map(|&i| record.get(i).unwrap_or_default());
    rows.push(FeedbackRow::from_cells(cells, selected.clone()));
  }
  Ok(rows)
}

pub fn read_feedback_lines<R: BufRead>(reader: R) -> Result<Vec<FeedbackRow>> {
  let mut rows = Vec::new();
  for line in reader.lines() {
    let line = line?;
    if !line.trim().is_empty() {
      rows.push(FeedbackRow::new(line.trim(), vec!["line".to_string()]));
    }
  }
  Ok(rows)
}

fn detect_text_column(headers: &csv::StringRecord) -> String {
  headers
    .iter()
    .find(|header| {
      let lower = header.to_lowercase();
      TEXT_COLUMN_HINTS.iter().any(|hint| lower.contains(hint))
    })
    .or_else(|| headers.get(0))
    .unwrap_or_default()
    .to_string()
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
  headers
    .iter()
    .position(|header| header.trim() == name.trim())
    .or_else(|| headers.iter().position(|header| header.trim().eq_ignore_ascii_case(name.trim())))
}

/// Reads an issue table. `Issue Key` and `Summary` are required; every
/// column other than those and `Description` is carried through.
pub fn read_issue_table<R: Read>(reader: R) -> Result<Vec<IssueRecord>> {
  let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
  let headers = csv.headers()?.clone();

  let require = |name: &str| {
    column_index(&headers, name)
      .ok_or_else(|| {
        PipelineError::validation(format!("issue table is missing the '{name}' column"))
      })
  };
  let key_idx = require(ISSUE_KEY_COLUMN)?;
  let summary_idx = require(SUMMARY_COLUMN)?;
  let description_idx = column_index(&headers, DESCRIPTION_COLUMN);

  let passthrough: Vec<(usize, String)> = headers
    .iter()
    .enumerate()
    .filter(|(i, _)| *i != key_idx && *i != summary_idx && Some(*i) != description_idx)
    .map(|(i, name)| (i, name.to_string()))
    .collect();

  let mut issues = Vec::new();
  for (line, record) in csv.records().enumerate() {
    let record = record?;
    let key = record.get(key_idx).unwrap_or_default().trim();
    if key.is_empty() {
      warn!("Skipping issue row {} with no issue key", line + 2);
      continue;
    }

    let mut issue = IssueRecord::new(key, record.get(summary_idx).unwrap_or_default().trim());
    if let Some(description) = description_idx.and_then(|i| record.get(i)).and_then(present) {
      issue = issue.with_description(description);
    }
    for (i, name) in &passthrough {
      issue = issue.with_field(name.clone(), record.get(*i).unwrap_or_default());
    }
    issues.push(issue);
  }
  Ok(issues)
}

/// Reads a cluster table previously written by `write_cluster_table` (or
/// edited by hand). Only `cluster_label` is required.
pub fn read_cluster_table<R: Read>(reader: R) -> Result<Vec<ClusterSummary>> {
  let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
  let headers = csv.headers()?.clone();

  let label_idx = column_index(&headers, "cluster_label").ok_or_else(|| {
    PipelineError::validation("cluster table is missing the 'cluster_label' column")
  })?;
  let idx = |name: &str| column_index(&headers, name);
  let (category_idx, priority_idx, count_idx) =
    (idx("category"), idx("priority_score"), idx("request_count"));
  let (reasoning_idx, keys_idx, feedback_idx) =
    (idx("reasoning"), idx("issue_keys"), idx("feedback_text"));

  let mut clusters = Vec::new();
  for record in csv.records() {
    let record = record?;
    let cell =
      |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or_default().trim().to_string();

    let feedback_text = cell(feedback_idx);
    let request_count = cell(count_idx)
      .parse::<f64>()
      .ok()
      .filter(|count| count.is_finite() && *count >= 0.0)
      .map(|count| count as usize)
      .unwrap_or_else(|| feedback_text.split(crate::model::FEEDBACK_DELIMITER).count());

    clusters.push(ClusterSummary {
      cluster_label: cell(Some(label_idx)),
      category: Category::parse_lenient(&cell(category_idx)),
      priority_score: cell(priority_idx)
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(1.0, 5.0) as u8)
        .unwrap_or(1),
      reasoning: cell(reasoning_idx),
      issue_keys: parse_issue_keys(&cell(keys_idx)),
      request_count,
      feedback_text,
    });
  }
  Ok(clusters)
}

fn present(value: &str) -> Option<String> {
  let trimmed = value.trim();
  (!trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("nan")).then(|| trimmed.to_string())
}

// Writers

pub fn write_cluster_table<W: Write>(writer: W, clusters: &[ClusterSummary]) -> Result<()> {
  let mut csv = csv::Writer::from_writer(writer);
  csv.write_record(CLUSTER_COLUMNS)?;
  for cluster in clusters {
    let keys = serde_json::to_string(&cluster.issue_keys).unwrap_or_else(|_| "[]".to_string());
    csv.write_record([
      cluster.cluster_label.as_str(),
      cluster.category.as_str(),
      &cluster.priority_score.to_string(),
      &cluster.request_count.to_string(),
      &cluster.reasoning,
      &keys,
      &cluster.feedback_text,
    ])?;
  }
  csv.flush()?;
  Ok(())
}

pub fn write_link_table<W: Write>(writer: W, links: &[Link]) -> Result<()> {
  let mut csv = csv::Writer::from_writer(writer);
  csv.write_record(LINK_COLUMNS)?;
  for link in links {
    csv.write_record([
      link.cluster_label.as_str(),
      &link.reasoning,
      &link.request_count.to_string(),
      &link.matched_issue_key,
      &link.matched_summary,
      link.match_type.as_str(),
      &format!("{:.4}", link.match_score),
    ])?;
  }
  csv.flush()?;
  Ok(())
}

/// Feedback in the shape `read_feedback_csv` auto-detects.
pub fn write_feedback_table<W: Write>(writer: W, rows: &[FeedbackRow]) -> Result<()> {
  let mut csv = csv::Writer::from_writer(writer);
  csv.write_record(["Feedback", "source"])?;
  for row in rows {
    csv.write_record([row.text.as_str(), &row.source_columns.join(";")])?;
  }
  csv.flush()?;
  Ok(())
}

pub fn write_issue_table<W: Write>(writer: W, issues: &[IssueRecord]) -> Result<()> {
  let extra = passthrough_columns(issues.iter().map(|issue| &issue.passthrough));
  let mut csv = csv::Writer::from_writer(writer);

  let mut header = vec![ISSUE_KEY_COLUMN, SUMMARY_COLUMN, DESCRIPTION_COLUMN];
  header.extend(extra.iter().map(String::as_str));
  csv.write_record(&header)?;

  for issue in issues {
    let mut row = vec![
      issue.issue_key.clone(),
      issue.summary.clone(),
      issue.description.clone().unwrap_or_default(),
    ];
    row.extend(extra.iter().map(|name| issue.field(name).unwrap_or_default().to_string()));
    csv.write_record(&row)?;
  }
  csv.flush()?;
  Ok(())
}

pub fn write_dealblocker_table<W: Write>(writer: W, rows: &[DealblockerSummary]) -> Result<()> {
  let extra = passthrough_columns(rows.iter().map(|row| &row.passthrough));
  let mut csv = csv::Writer::from_writer(writer);

  let mut header =
    vec![ISSUE_KEY_COLUMN, SUMMARY_COLUMN, DESCRIPTION_COLUMN, "Urgency Score", "Urgency Reason"];
  header.extend(extra.iter().map(String::as_str));
  csv.write_record(&header)?;

  for row in rows {
    let mut record = vec![
      row.issue_key.clone(),
      row.summary.clone(),
      row.description.clone().unwrap_or_default(),
      row.urgency_score.to_string(),
      row.urgency_reason.to_string(),
    ];
    record.extend(extra.iter().map(|name| {
      row
        .passthrough
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
    }));
    csv.write_record(&record)?;
  }
  csv.flush()?;
  Ok(())
}

/// Union of passthrough column names, in first-seen order.
fn passthrough_columns<'a>(fields: impl Iterator<Item = &'a Vec<(String, String)>>) -> Vec<String> {
  let mut names: Vec<String> = Vec::new();
  for (name, _) in fields.flatten() {
    if !names.contains(name) {
      names.push(name.clone());
    }
  }
  names
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::MatchType;

  fn output(write: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
    let mut buffer = Vec::new();
    write(&mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
  }

  #[test]
  fn test_feedback_column_autodetect() -> Result<()> {
    let data = "id,Customer Comment,owner\n1,App crashes,ann\n2,Dark mode please,bob\n";
    let rows = read_feedback_csv(data.as_bytes(), &[])?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].text, "App crashes");
    assert_eq!(rows[0].source_columns, vec!["Customer Comment"]);
    Ok(())
  }

  #[test]
  fn test_feedback_falls_back_to_first_column() -> Result<()> {
    let rows = read_feedback_csv("notes,owner\nslow exports,ann\n".as_bytes(), &[])?;
    assert_eq!(rows[0].text, "slow exports");
    Ok(())
  }

  #[test]
  fn test_multiple_columns_concatenate_skipping_blanks() -> Result<()> {
    let data = "title,body\nLogin,crashes on submit\n,nan\nnan,only body\n";
    let columns = vec!["title".to_string(), "body".to_string()];
    let rows = read_feedback_csv(data.as_bytes(), &columns)?;

    let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["Login crashes on submit", "", "only body"]);
    Ok(())
  }

  #[test]
  fn test_unknown_feedback_column_is_validation_error() {
    let result = read_feedback_csv("a,b\n1,2\n".as_bytes(), &["missing".to_string()]);
    assert!(matches!(result, Err(PipelineError::Validation { .. })));
  }

  #[test]
  fn test_plain_lines_skip_blanks() -> Result<()> {
    let rows = read_feedback_lines("first item\n\n   \n second item \n".as_bytes())?;
    let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["first item", "second item"]);
    Ok(())
  }

  #[test]
  fn test_issue_table_requires_key_and_summary() {
    let result = read_issue_table("Issue Key,Description\nA-1,x\n".as_bytes());
    match result {
      Err(PipelineError::Validation { message }) => assert!(message.contains("Summary")),
      other => panic!("Expected Validation error, got: {other:?}"),
    }
  }

  #[test]
  fn test_issue_table_passthrough_and_blank_keys() -> Result<()> {
    let data = "Issue Key,Summary,Status,Description,ARR\nSDK-42,Ruby SDK,Open,nan,50000\n,orphan,Open,,\nSDK-43,Go SDK,Done,Needed for renewal,\n";
    let issues = read_issue_table(data.as_bytes())?;

    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].description, None);
    assert_eq!(issues[0].field("Status"), Some("Open"));
    assert_eq!(issues[0].field("ARR"), Some("50000"));
    assert_eq!(issues[1].description.as_deref(), Some("Needed for renewal"));
    let names: Vec<_> = issues[0].passthrough.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["Status", "ARR"]);
    Ok(())
  }

  #[test]
  fn test_cluster_table_header_order() {
    let csv = output(|buf| write_cluster_table(buf, &[]));
    assert_eq!(csv.trim_end(), CLUSTER_COLUMNS.join(","));
  }

  #[test]
  fn test_cluster_table_round_trip_keeps_keys() -> Result<()> {
    let summary = ClusterSummary {
      cluster_label: "Login Crashes".to_string(),
      category: Category::Bug,
      priority_score: 5,
      reasoning: "Crash, on login".to_string(),
      issue_keys: vec!["AUTH-1".to_string(), "AUTH-2".to_string()],
      request_count: 2,
      feedback_text: "App crashes | Login broken".to_string(),
    };
    let csv = output(|buf| write_cluster_table(buf, std::slice::from_ref(&summary)));
    assert!(csv.contains(r#""[""AUTH-1"",""AUTH-2""]""#), "{csv}");

    let read = read_cluster_table(csv.as_bytes())?;
    assert_eq!(read, vec![summary]);
    Ok(())
  }

  #[test]
  fn test_cluster_table_tolerates_hand_edited_cells() -> Result<()> {
    let data = "cluster_label,priority_score,issue_keys,feedback_text\nBilling,high,['BILL-1',a | b\n";
    let read = read_cluster_table(data.as_bytes())?;
    assert_eq!(read[0].priority_score, 1);
    assert!(read[0].issue_keys.is_empty());
    assert_eq!(read[0].request_count, 2);
    assert_eq!(read[0].category, Category::Other);
    Ok(())
  }

  #[test]
  fn test_link_table_columns_and_values() {
    let link = Link {
      cluster_label: "Ruby SDK".to_string(),
      reasoning: "Need Ruby".to_string(),
      request_count: 3,
      matched_issue_key: "SDK-42".to_string(),
      matched_summary: "Ruby SDK".to_string(),
      match_type: MatchType::ExplicitKey,
      match_score: 1.0,
    };
    let csv = output(|buf| write_link_table(buf, &[link]));
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], LINK_COLUMNS.join(","));
    assert_eq!(lines[1], "Ruby SDK,Need Ruby,3,SDK-42,Ruby SDK,ExplicitKey,1.0000");
  }

  #[test]
  fn test_feedback_table_reads_back() -> Result<()> {
    let rows = vec![FeedbackRow::new("Need SAML, soon", vec!["slack:C1".to_string()])];
    let csv = output(|buf| write_feedback_table(buf, &rows));

    let read = read_feedback_csv(csv.as_bytes(), &[])?;
    assert_eq!(read[0].text, "Need SAML, soon");
    assert_eq!(read[0].source_columns, vec!["Feedback"]);
    Ok(())
  }

  #[test]
  fn test_dealblocker_table_appends_passthrough() {
    let rows = vec![DealblockerSummary {
      issue_key: "D-1".to_string(),
      summary: "SSO".to_string(),
      description: None,
      urgency_score: 3,
      urgency_reason: "Normal priority",
      passthrough: vec![("ARR".to_string(), "10".to_string())],
    }];
    let csv = output(|buf| write_dealblocker_table(buf, &rows));
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "Issue Key,Summary,Description,Urgency Score,Urgency Reason,ARR");
    assert_eq!(lines[1], "D-1,SSO,,3,Normal priority,10");
  }
}
