//! Repositories for the linked repository, webhook deliveries and the
//! pull request / issue mirrors.

use serde::Serialize;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, Row};
use ticketbuddy_core::{GitHubEvent, IssueMirror, PullRequestMirror, RepoLink};

use crate::error::Result;

// =============================================================================
// Linked repository
// =============================================================================

/// Single-row table holding the linked repository.
pub struct RepoLinkRepo {
    pool: SqlitePool,
}

impl RepoLinkRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Link `link`, replacing any previous link.
    pub async fn replace(&self, link: &RepoLink) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO github_link (slot, id, url, default_branch, connected_at)
            VALUES (1, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.url)
        .bind(&link.default_branch)
        .bind(&link.connected_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self) -> Result<Option<RepoLink>> {
        let row = sqlx::query(
            "SELECT id, url, default_branch, connected_at FROM github_link WHERE slot = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(RepoLink {
                id: row.try_get("id")?,
                url: row.try_get("url")?,
                default_branch: row.try_get("default_branch")?,
                connected_at: row.try_get("connected_at")?,
            })
        })
        .transpose()
    }

    /// Remove the link. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM github_link")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Webhook deliveries
// =============================================================================

/// Received webhook deliveries, keyed by delivery id.
pub struct EventsRepo {
    pool: SqlitePool,
}

impl EventsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a delivery. Returns `false` when the delivery id was already
    /// recorded, in which case nothing changes.
    pub async fn record(&self, event: &GitHubEvent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO github_events (id, repo_id, type, summary, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.repo_id)
        .bind(&event.event_type)
        .bind(&event.summary)
        .bind(&event.payload)
        .bind(&event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Most recent deliveries for one repository.
    pub async fn for_repo(&self, repo_id: &str, limit: i64) -> Result<Vec<GitHubEvent>> {
        let rows = sqlx::query(
            "SELECT id, repo_id, type, summary, payload, created_at FROM github_events \
             WHERE repo_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(repo_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_event).collect()
    }
}

fn map_event(row: &SqliteRow) -> Result<GitHubEvent> {
    Ok(GitHubEvent {
        id: row.try_get("id")?,
        repo_id: row.try_get("repo_id")?,
        event_type: row.try_get("type")?,
        summary: row.try_get("summary")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
    })
}

// =============================================================================
// Mirrors
// =============================================================================

/// Open pull request and issue counts of one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpenCounts {
    #[serde(rename = "openPRs")]
    pub pull_requests: i64,
    #[serde(rename = "openIssues")]
    pub issues: i64,
}

/// Local copies of upstream pull requests and issues.
///
/// Upserts always overwrite, so re-applying the same upstream state is
/// harmless.
pub struct MirrorsRepo {
    pool: SqlitePool,
}

impl MirrorsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_pull_request(&self, pr: &PullRequestMirror) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO github_prs (
                repo_id, number, title, author, state, merged, html_url, head_sha,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (repo_id, number) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                state = excluded.state,
                merged = excluded.merged,
                html_url = excluded.html_url,
                head_sha = excluded.head_sha,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&pr.repo_id)
        .bind(pr.number as i64)
        .bind(&pr.title)
        .bind(&pr.author)
        .bind(&pr.state)
        .bind(pr.merged)
        .bind(&pr.html_url)
        .bind(&pr.head_sha)
        .bind(&pr.created_at)
        .bind(&pr.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_issue(&self, issue: &IssueMirror) -> Result<()> {
        let labels = serde_json::to_string(&issue.labels)?;

        sqlx::query(
            r#"
            INSERT INTO github_issues (
                repo_id, number, title, author, state, html_url, labels, body,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (repo_id, number) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                state = excluded.state,
                html_url = excluded.html_url,
                labels = excluded.labels,
                body = excluded.body,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&issue.repo_id)
        .bind(issue.number as i64)
        .bind(&issue.title)
        .bind(&issue.author)
        .bind(&issue.state)
        .bind(&issue.html_url)
        .bind(labels)
        .bind(&issue.body)
        .bind(&issue.created_at)
        .bind(&issue.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_pull_request(
        &self,
        repo_id: &str,
        number: u64,
    ) -> Result<Option<PullRequestMirror>> {
        let row = sqlx::query(
            "SELECT repo_id, number, title, author, state, merged, html_url, head_sha, \
             created_at, updated_at FROM github_prs WHERE repo_id = ? AND number = ?",
        )
        .bind(repo_id)
        .bind(number as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_pull_request).transpose()
    }

    pub async fn get_issue(&self, repo_id: &str, number: u64) -> Result<Option<IssueMirror>> {
        let row = sqlx::query(
            "SELECT repo_id, number, title, author, state, html_url, labels, body, \
             created_at, updated_at FROM github_issues WHERE repo_id = ? AND number = ?",
        )
        .bind(repo_id)
        .bind(number as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_issue).transpose()
    }

    /// Open counts according to the mirrors.
    pub async fn count_open(&self, repo_id: &str) -> Result<OpenCounts> {
        let (pull_requests,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM github_prs WHERE repo_id = ? AND state = 'open'")
                .bind(repo_id)
                .fetch_one(&self.pool)
                .await?;

        let (issues,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM github_issues WHERE repo_id = ? AND state = 'open'",
        )
        .bind(repo_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(OpenCounts {
            pull_requests,
            issues,
        })
    }
}

pub(crate) async fn mark_merged<'e, E>(
    executor: E,
    repo_id: &str,
    number: u64,
    now: &str,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE github_prs SET state = 'closed', merged = 1, updated_at = ? \
         WHERE repo_id = ? AND number = ?",
    )
    .bind(now)
    .bind(repo_id)
    .bind(number as i64)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn map_pull_request(row: &SqliteRow) -> Result<PullRequestMirror> {
    Ok(PullRequestMirror {
        number: row.try_get::<i64, _>("number")? as u64,
        repo_id: row.try_get("repo_id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        state: row.try_get("state")?,
        merged: row.try_get("merged")?,
        html_url: row.try_get("html_url")?,
        head_sha: row.try_get("head_sha")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_issue(row: &SqliteRow) -> Result<IssueMirror> {
    let labels: String = row.try_get("labels")?;
    Ok(IssueMirror {
        number: row.try_get::<i64, _>("number")? as u64,
        repo_id: row.try_get("repo_id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        state: row.try_get("state")?,
        html_url: row.try_get("html_url")?,
        labels: serde_json::from_str(&labels)?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
