//! Webhook signature verification and payload parsing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use ticketbuddy_core::{Error, IssueMirror, PullRequestMirror, Result};

use crate::types::{GitHubIssue, GitHubPullRequest, GitHubRepository};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
/// Header carrying the event type.
pub const EVENT_HEADER: &str = "x-github-event";
/// Header carrying the unique delivery id.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Check a `sha256=<hex>` signature header against the raw request body.
///
/// The digest comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the `sha256=<hex>` signature header GitHub would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Mirror row a delivery asks us to upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorUpdate {
    PullRequest(PullRequestMirror),
    Issue(IssueMirror),
}

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub event_type: String,
    /// `owner/name` of the repository the delivery is about
    pub repo_id: Option<String>,
    /// One line for the activity feed
    pub summary: String,
    pub mirror: Option<MirrorUpdate>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: GitHubPullRequest,
    repository: GitHubRepository,
}

#[derive(Deserialize)]
struct IssuesPayload {
    action: String,
    issue: GitHubIssue,
    repository: GitHubRepository,
}

#[derive(Deserialize)]
struct OtherPayload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    zen: Option<String>,
    #[serde(default)]
    repository: Option<GitHubRepository>,
}

impl WebhookEvent {
    /// Interpret a delivery body for the given `X-GitHub-Event` type.
    ///
    /// `pull_request` and `issues` deliveries must carry the fields the
    /// mirrors need; other event types are accepted as-is.
    pub fn parse(event_type: &str, payload: &serde_json::Value) -> Result<Self> {
        match event_type {
            "pull_request" => {
                let p: PullRequestPayload = serde_json::from_value(payload.clone())
                    .map_err(|e| Error::InvalidData(format!("Malformed pull_request payload: {}", e)))?;
                let repo_id = p.repository.full_name;
                let action = if p.action == "closed" && p.pull_request.is_merged() {
                    "merged"
                } else {
                    p.action.as_str()
                };
                Ok(Self {
                    event_type: event_type.to_string(),
                    summary: format!(
                        "PR #{} {}: {}",
                        p.pull_request.number, action, p.pull_request.title
                    ),
                    mirror: Some(MirrorUpdate::PullRequest(p.pull_request.to_mirror(&repo_id))),
                    repo_id: Some(repo_id),
                })
            }
            "issues" => {
                let p: IssuesPayload = serde_json::from_value(payload.clone())
                    .map_err(|e| Error::InvalidData(format!("Malformed issues payload: {}", e)))?;
                let repo_id = p.repository.full_name;
                Ok(Self {
                    event_type: event_type.to_string(),
                    summary: format!("Issue #{} {}: {}", p.issue.number, p.action, p.issue.title),
                    mirror: Some(MirrorUpdate::Issue(p.issue.to_mirror(&repo_id))),
                    repo_id: Some(repo_id),
                })
            }
            other => {
                let p: OtherPayload = serde_json::from_value(payload.clone()).unwrap_or(OtherPayload {
                    action: None,
                    zen: None,
                    repository: None,
                });
                let summary = match (other, &p.zen, &p.action) {
                    ("ping", Some(zen), _) => format!("Webhook ping: {}", zen),
                    ("ping", None, _) => "Webhook ping".to_string(),
                    (_, _, Some(action)) => format!("{} {}", other, action),
                    _ => format!("{} event", other),
                };
                Ok(Self {
                    event_type: other.to_string(),
                    repo_id: p.repository.map(|r| r.full_name),
                    summary,
                    mirror: None,
                })
            }
        }
    }
}
