//! Short coloured run summaries, written to stderr so stdout stays CSV.

use colored::*;

use crate::model::{ClusterSummary, Link, MatchType};
use crate::summarize::FAILED_LABEL;
use crate::urgency::DealblockerSummary;

const TOP_CLUSTERS: usize = 5;

pub fn cluster_overview(summaries: &[ClusterSummary]) -> String {
  let items: usize = summaries.iter().map(|s| s.request_count).sum();
  let failed = summaries.iter().filter(|s| s.cluster_label == FAILED_LABEL).count();

  let mut lines = vec![format!(
    "{} {} clusters from {} feedback items",
    "✓".green(),
    summaries.len().to_string().bold(),
    items
  )];

  for summary in summaries.iter().take(TOP_CLUSTERS) {
    lines.push(format!(
      "  {} {} ({}, {} requests)",
      priority_badge(summary.priority_score),
      summary.cluster_label.bold(),
      summary.category.to_string().cyan(),
      summary.request_count
    ));
  }
  if summaries.len() > TOP_CLUSTERS {
    lines.push(format!("  ... and {} more", summaries.len() - TOP_CLUSTERS).dimmed().to_string());
  }
  if failed > 0 {
    lines.push(format!("{} {failed} clusters could not be summarized", "!".yellow()));
  }

  lines.join("\n")
}

pub fn link_overview(links: &[Link], cluster_count: usize) -> String {
  let explicit = links.iter().filter(|l| l.match_type == MatchType::ExplicitKey).count();
  let semantic = links.len() - explicit;

  let mut lines = vec![format!(
    "{} {} links for {} clusters ({} explicit, {} semantic)",
    "✓".green(),
    links.len().to_string().bold(),
    cluster_count,
    explicit,
    semantic
  )];

  for link in links {
    lines.push(format!(
      "  {} {} {} ({} {:.2})",
      link.cluster_label,
      "→".dimmed(),
      link.matched_issue_key.yellow(),
      link.match_type,
      link.match_score
    ));
  }

  lines.join("\n")
}

pub fn dealblocker_overview(rows: &[DealblockerSummary]) -> String {
  let urgent = rows.iter().filter(|row| row.urgency_score >= 5).count();
  format!(
    "{} {} issues scored, {} urgent",
    "✓".green(),
    rows.len(),
    urgent.to_string().red().bold()
  )
}

fn priority_badge(priority: u8) -> ColoredString {
  let badge = format!("[P{priority}]");
  match priority {
    5 => badge.red().bold(),
    4 => badge.red(),
    3 => badge.yellow(),
    _ => badge.normal(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Category;

  fn summary(label: &str, priority: u8, count: usize) -> ClusterSummary {
    ClusterSummary {
      cluster_label: label.to_string(),
      category: Category::Bug,
      priority_score: priority,
      reasoning: String::new(),
      issue_keys: Vec::new(),
      request_count: count,
      feedback_text: String::new(),
    }
  }

  #[test]
  fn test_cluster_overview_lists_top_clusters() {
    colored::control::set_override(false);
    let summaries = vec![summary("Login Crashes", 5, 2), summary(FAILED_LABEL, 1, 1)];

    let text = cluster_overview(&summaries);

    assert!(text.starts_with("✓ 2 clusters from 3 feedback items"));
    assert!(text.contains("[P5] Login Crashes (Bug, 2 requests)"));
    assert!(text.contains("1 clusters could not be summarized"));
  }

  #[test]
  fn test_link_overview_counts_match_types() {
    colored::control::set_override(false);
    let link = Link {
      cluster_label: "Ruby SDK".to_string(),
      reasoning: String::new(),
      request_count: 1,
      matched_issue_key: "SDK-42".to_string(),
      matched_summary: String::new(),
      match_type: MatchType::ExplicitKey,
      match_score: 1.0,
    };

    let text = link_overview(&[link], 3);

    assert!(text.contains("1 links for 3 clusters (1 explicit, 0 semantic)"));
    assert!(text.contains("Ruby SDK → SDK-42 (ExplicitKey 1.00)"));
  }
}
