//! Prompt sent to the generative service for one cluster.

use crate::model::Category;

const INSTRUCTIONS: &str = "\
You are an expert Product Feedback Intelligence System.
I have a group of customer feedback items that have already been clustered by semantic similarity.
Your job is to analyze all of them and return a single JSON object that summarizes the ENTIRE group.

- **cluster_label**: A single, concise group name (e.g., \"Ruby SDK Support\", \"Billing Invoice Errors\").
- **category**: The best fit: <{categories}>
- **priority_score**: An integer (1-5) for the whole cluster's urgency.
- **reasoning**: A one-line summary of the core request or problem.
- **issue_keys**: An array of any Jira keys (e.g., \"SDK-123\") found in the texts.
";

pub fn build_prompt(texts: &[String], context: Option<&str>) -> String {
  let categories = Category::ALL.iter().map(Category::as_str).collect::<Vec<_>>().join("|");

  let items = texts
    .iter()
    .map(|text| format!("- \"{}\"", text.replace('"', "'").trim()))
    .collect::<Vec<_>>()
    .join("\n");

  let mut prompt = INSTRUCTIONS.replace("{categories}", &categories);

  if let Some(hint) = context.map(str::trim).filter(|hint| !hint.is_empty()) {
    prompt.push_str(&format!(
      "\nThe product team asked you to keep this in mind while labeling and prioritizing:\n{hint}\n"
    ));
  }

  prompt.push_str(&format!("\nHere is the group of feedback items:\n{items}\n"));
  prompt.push_str("\nReturn ONLY the single JSON object, nothing else.\n");
  prompt
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_prompt_lists_items_as_quoted_bullets() {
    let texts = vec!["  App \"crashes\" on login ".to_string(), "Login broken".to_string()];
    let prompt = build_prompt(&texts, None);

    assert!(prompt.contains("- \"App 'crashes' on login\""));
    assert!(prompt.contains("- \"Login broken\""));
    assert!(prompt.ends_with("Return ONLY the single JSON object, nothing else.\n"));
  }

  #[test]
  fn test_prompt_names_every_field_and_category() {
    let prompt = build_prompt(&["x".to_string()], None);
    for field in ["cluster_label", "category", "priority_score", "reasoning", "issue_keys"] {
      assert!(prompt.contains(field), "missing {field}");
    }
    assert!(prompt.contains("<Bug|Feature Request|UX Issue|Performance|SDK Coverage|Billing|Other>"));
  }

  #[test]
  fn test_context_hint_only_when_present() {
    let without = build_prompt(&["x".to_string()], Some("   "));
    assert!(!without.contains("keep this in mind"));

    let with = build_prompt(&["x".to_string()], Some("Enterprise accounts first"));
    assert!(with.contains("keep this in mind"));
    assert!(with.contains("Enterprise accounts first"));
  }
}
