//! Background work: auto-tickets for open issues and poll resynchronisation
//! of the mirrors.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use ticketbuddy_core::{Importance, NewTicket, Result};
use ticketbuddy_github::{GitHubClient, GitHubIssue, RepoRef};
use ticketbuddy_storage::Store;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What one resync pass refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pull_requests: usize,
    pub issues: usize,
}

/// Refresh every pull request and issue mirror of the linked repository.
///
/// Returns `None` when no repository is linked.
pub async fn resync_linked_repository(
    store: &Store,
    github: &GitHubClient,
) -> Result<Option<SyncReport>> {
    let Some(link) = store.repo_link().get().await? else {
        debug!("No linked repository, nothing to resync");
        return Ok(None);
    };
    let repo = RepoRef::parse(&link.id)?;
    let repo_id = repo.full_name();

    let pull_requests = github.list_pull_requests(&repo, "all").await?;
    let issues = github.list_issues(&repo, "all", None).await?;

    let mirrors = store.mirrors();
    for pr in &pull_requests {
        mirrors.upsert_pull_request(&pr.to_mirror(&repo_id)).await?;
    }
    for issue in &issues {
        mirrors.upsert_issue(&issue.to_mirror(&repo_id)).await?;
    }

    let report = SyncReport {
        pull_requests: pull_requests.len(),
        issues: issues.len(),
    };
    info!(repo = %repo_id, prs = report.pull_requests, issues = report.issues, "Mirrors resynchronised");
    Ok(Some(report))
}

/// Run [`resync_linked_repository`] every `interval` until the runtime shuts
/// down. Failures are logged and the next tick tries again.
pub fn spawn_poller(store: Store, github: Arc<GitHubClient>, interval: Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Mirror poller started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = resync_linked_repository(&store, &github).await {
                warn!(error = %e, "Mirror resync failed");
            }
        }
    })
}

/// Create a ticket for every open issue that has none yet.
///
/// Detached from the request that triggered it; errors are logged and
/// dropped.
pub fn spawn_auto_tickets(store: Store, repo: RepoRef, issues: Vec<GitHubIssue>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match create_missing_tickets(&store, &repo, &issues).await {
            Ok(0) => {}
            Ok(created) => info!(repo = %repo, created, "Tickets created for open issues"),
            Err(e) => warn!(repo = %repo, error = %e, "Auto-ticket creation failed"),
        }
    })
}

/// Returns the number of tickets created.
pub async fn create_missing_tickets(
    store: &Store,
    repo: &RepoRef,
    issues: &[GitHubIssue],
) -> Result<usize> {
    let repo_url = repo.html_url();
    let tickets = store.tickets();
    let mut created = 0;

    for issue in issues.iter().filter(|i| i.state == "open") {
        let description = issue
            .body
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&issue.title);

        let ticket = tickets
            .create_for_issue(NewTicket {
                name: Some(issue.title.clone()),
                description: description.to_string(),
                importance: Some(Importance::MEDIUM),
                assignee: None,
                github_issue_number: Some(issue.number),
                github_repo_url: Some(repo_url.clone()),
            })
            .await?;
        if ticket.is_some() {
            created += 1;
        }
    }

    Ok(created)
}
