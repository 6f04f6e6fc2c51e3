//! Deterministic stand-ins for the embedding model and the summarization
//! service.

#![allow(dead_code)]

use async_trait::async_trait;
use dealsight::embeddings::Embedder;
use dealsight::summarize::{SummarizationClient, SummarizationError};
use dealsight::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One axis per keyword; texts matching no keyword land on a shared last axis.
pub struct KeywordEmbedder {
  pub keywords: Vec<&'static str>,
  pub calls: AtomicUsize,
}

impl KeywordEmbedder {
  pub fn new(keywords: &[&'static str]) -> Self {
    Self { keywords: keywords.to_vec(), calls: AtomicUsize::new(0) }
  }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(
      texts
        .iter()
        .map(|text| {
          let lower = text.to_lowercase();
          let mut vector = vec![0.0; self.keywords.len() + 1];
          match self.keywords.iter().position(|keyword| lower.contains(keyword)) {
            Some(axis) => vector[axis] = 1.0,
            None => vector[self.keywords.len()] = 1.0,
          }
          vector
        })
        .collect(),
    )
  }
}

/// Answers with the first scripted response whose trigger appears in the
/// prompt, else with an empty object.
pub struct ScriptedClient {
  pub script: Vec<(&'static str, &'static str)>,
  pub prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
  pub fn new(script: &[(&'static str, &'static str)]) -> Self {
    Self { script: script.to_vec(), prompts: Mutex::new(Vec::new()) }
  }
}

#[async_trait]
impl SummarizationClient for ScriptedClient {
  fn name(&self) -> &'static str {
    "scripted"
  }

  async fn complete(&self, prompt: &str) -> std::result::Result<String, SummarizationError> {
    self.prompts.lock().unwrap().push(prompt.to_string());
    let reply = self
      .script
      .iter()
      .find(|(trigger, _)| prompt.contains(trigger))
      .map(|(_, reply)| reply.to_string())
      .unwrap_or_else(|| "{}".to_string());
    Ok(reply)
  }
}

pub struct FailingClient {
  pub calls: AtomicUsize,
}

impl FailingClient {
  pub fn new() -> Self {
    Self { calls: AtomicUsize::new(0) }
  }
}

#[async_trait]
impl SummarizationClient for FailingClient {
  fn name(&self) -> &'static str {
    "failing"
  }

  async fn complete(&self, _prompt: &str) -> std::result::Result<String, SummarizationError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Err(SummarizationError::Status {
      provider: "failing",
      status: 503,
      body: "service unavailable".to_string(),
    })
  }
}
