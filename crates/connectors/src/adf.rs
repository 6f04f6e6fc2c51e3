//! Flattening of Atlassian Document Format bodies to plain text.

use serde_json::Value;

const BLOCK_NODES: [&str; 12] = [
  "paragraph",
  "heading",
  "blockquote",
  "codeBlock",
  "listItem",
  "bulletList",
  "orderedList",
  "panel",
  "rule",
  "tableRow",
  "mediaSingle",
  "taskItem",
];

/// Joins text nodes, separating block nodes with newlines.
pub fn to_plain_text(document: &Value) -> String {
  let mut out = String::new();
  render(document, &mut out);

  out
    .lines()
    .map(str::trim_end)
    .filter(|line| !line.trim().is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

fn render(node: &Value, out: &mut String) {
  let node_type = node["type"].as_str().unwrap_or_default();

  match node_type {
    "text" => out.push_str(node["text"].as_str().unwrap_or_default()),
    "hardBreak" => out.push('\n'),
    "mention" | "emoji" | "inlineCard" => {
      let attrs = &node["attrs"];
      let text = attrs["text"]
        .as_str()
        .or_else(|| attrs["shortName"].as_str())
        .or_else(|| attrs["url"].as_str());
      out.push_str(text.unwrap_or_default());
    }
    _ => {
      if let Some(children) = node["content"].as_array() {
        for child in children {
          render(child, out);
        }
      }
      if BLOCK_NODES.contains(&node_type) && !out.ends_with('\n') {
        out.push('\n');
      }
    }
  }
}
