//! Domain types shared across TicketBuddy crates.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Current time as an RFC 3339 timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// Ticket
// =============================================================================

/// Lifecycle stage of a ticket.
///
/// The dashboard walks tickets open → in-progress → qa → resolved, but any
/// value may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Qa,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Qa => "qa",
            TicketStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in-progress" => Ok(TicketStatus::InProgress),
            "qa" => Ok(TicketStatus::Qa),
            "resolved" => Ok(TicketStatus::Resolved),
            other => Err(Error::InvalidData(format!(
                "status must be one of open, in-progress, qa, resolved (got '{}')",
                other
            ))),
        }
    }
}

/// Ticket priority: 1 = low, 2 = medium, 3 = high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Importance(u8);

impl Importance {
    pub const LOW: Importance = Importance(1);
    pub const MEDIUM: Importance = Importance(2);
    pub const HIGH: Importance = Importance(3);

    /// Validate a raw importance value.
    pub fn new(value: i64) -> Result<Self> {
        match value {
            1..=3 => Ok(Importance(value as u8)),
            other => Err(Error::InvalidData(format!(
                "importance must be 1, 2 or 3 (got {})",
                other
            ))),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Importance {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Importance::new(value)
    }
}

impl From<Importance> for u8 {
    fn from(value: Importance) -> Self {
        value.0
    }
}

/// A unit of requested work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub name: Option<String>,
    pub description: String,
    pub importance: Option<Importance>,
    pub status: TicketStatus,
    pub assignee: Option<String>,
    pub github_issue_number: Option<u64>,
    pub github_pr_number: Option<u64>,
    pub github_repo_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// Fields for a ticket about to be inserted. Status always starts as open.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub name: Option<String>,
    pub description: String,
    pub importance: Option<Importance>,
    pub assignee: Option<String>,
    pub github_issue_number: Option<u64>,
    pub github_repo_url: Option<String>,
}

/// Partial update of a ticket; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct TicketPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub importance: Option<Importance>,
    pub status: Option<TicketStatus>,
    pub assignee: Option<String>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.importance.is_none()
            && self.status.is_none()
            && self.assignee.is_none()
    }
}

/// Structured ticket proposed by the classifier, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    pub priority: Importance,
    pub assignee: String,
}

impl From<TicketDraft> for NewTicket {
    fn from(draft: TicketDraft) -> Self {
        NewTicket {
            name: Some(draft.title),
            description: draft.description,
            importance: Some(draft.priority),
            assignee: Some(draft.assignee),
            ..Default::default()
        }
    }
}

// =============================================================================
// Incident
// =============================================================================

/// Severity reported by the diagnostic tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(Error::InvalidData(format!("unknown severity '{}'", other))),
        }
    }
}

/// Immutable record of a detected service health issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "ticketId")]
    pub ticket_id: String,
    pub service: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(rename = "recommendedFix")]
    pub recommended_fix: String,
    pub created_at: String,
}

// =============================================================================
// GitHub integration
// =============================================================================

/// The single linked repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoLink {
    /// `owner/name`
    pub id: String,
    pub url: String,
    pub default_branch: String,
    pub connected_at: String,
}

/// One received webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubEvent {
    /// GitHub delivery id
    pub id: String,
    pub repo_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub summary: String,
    #[serde(default, skip_serializing)]
    pub payload: String,
    pub created_at: String,
}

/// Local copy of an upstream pull request.
///
/// `number` is exposed as `id` in JSON, which is what the dashboard merges by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestMirror {
    #[serde(rename = "id")]
    pub number: u64,
    pub repo_id: String,
    pub title: String,
    pub author: String,
    pub state: String,
    pub merged: bool,
    pub html_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_sha: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Local copy of an upstream issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueMirror {
    #[serde(rename = "id")]
    pub number: u64,
    pub repo_id: String,
    pub title: String,
    pub author: String,
    pub state: String,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
