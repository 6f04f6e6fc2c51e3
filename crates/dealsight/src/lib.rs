//! Dealsight - feedback consolidation and dealblocker linking
//!
//! Groups free-text product feedback into labeled, prioritized clusters and
//! links those clusters to issue-tracker records.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod keys;
pub mod link;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod summarize;
pub mod table;
pub mod urgency;

pub use config::{Settings, DISTANCE_THRESHOLD, SIMILARITY_THRESHOLD};
pub use error::{PipelineError, Result};
pub use model::{Category, Cluster, ClusterSummary, FeedbackRow, IssueRecord, Link, MatchType};
pub use pipeline::Pipeline;
