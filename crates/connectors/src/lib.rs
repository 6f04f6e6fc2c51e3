//! Connectors - clients for the systems dealsight reads from
//!
//! Jira supplies the issue table that clusters are linked against; Slack
//! channel history is one source of raw feedback.

pub mod adf;
pub mod error;
pub mod jira;
pub mod slack;

pub use error::{ConnectorError, Result};
pub use jira::{JiraClient, JiraConfig, JiraIssue};
pub use slack::{SlackClient, SlackMessage};
