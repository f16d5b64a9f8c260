//! Ticket repository.

use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, QueryBuilder, Row};
use ticketbuddy_core::{
    ids, now_timestamp, Importance, NewTicket, Ticket, TicketPatch, TicketStatus,
};

use crate::error::{Result, StorageError};

const TICKET_COLUMNS: &str = "id, name, description, importance, status, assignee, \
     github_issue_number, github_pr_number, github_repo_url, createdAt, updatedAt";

/// Repository for ticket rows.
pub struct TicketsRepo {
    pool: SqlitePool,
}

impl TicketsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new ticket with a fresh id; status starts as `open`.
    pub async fn create(&self, new: NewTicket) -> Result<Ticket> {
        let ticket = open_ticket(new);
        insert(&self.pool, &ticket, "INSERT").await?;
        Ok(ticket)
    }

    /// Insert a ticket tied to an upstream issue unless that issue already
    /// has one. Returns `None` when the issue was already covered.
    ///
    /// The partial unique index on (`github_repo_url`, `github_issue_number`)
    /// holds this to one ticket per issue across concurrent callers.
    pub async fn create_for_issue(&self, new: NewTicket) -> Result<Option<Ticket>> {
        let ticket = open_ticket(new);
        let inserted = insert(&self.pool, &ticket, "INSERT OR IGNORE").await?;
        Ok(inserted.then_some(ticket))
    }

    pub async fn get(&self, id: &str) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row).transpose()
    }

    /// All tickets, newest first.
    pub async fn list(&self) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tickets ORDER BY createdAt DESC, rowid DESC",
            TICKET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    /// Apply the supplied fields and bump `updatedAt`.
    ///
    /// Returns `None` when no ticket has this id.
    pub async fn update(&self, id: &str, patch: TicketPatch) -> Result<Option<Ticket>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE tickets SET updatedAt = ");
        query.push_bind(now_timestamp());

        if let Some(name) = patch.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(description) = patch.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(importance) = patch.importance {
            query.push(", importance = ").push_bind(importance.get());
        }
        if let Some(status) = patch.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(assignee) = patch.assignee {
            query.push(", assignee = ").push_bind(assignee);
        }

        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(id).await
    }
}

fn open_ticket(new: NewTicket) -> Ticket {
    let now = now_timestamp();
    Ticket {
        id: ids::ticket_id(),
        name: new.name,
        description: new.description,
        importance: new.importance,
        status: TicketStatus::Open,
        assignee: new.assignee,
        github_issue_number: new.github_issue_number,
        github_pr_number: None,
        github_repo_url: new.github_repo_url,
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Returns whether a row was written; `verb` is `INSERT` or `INSERT OR IGNORE`.
async fn insert(pool: &SqlitePool, ticket: &Ticket, verb: &str) -> Result<bool> {
    let result = sqlx::query(&format!(
        r#"
        {} INTO tickets (
            id, name, description, importance, status, assignee,
            github_issue_number, github_pr_number, github_repo_url,
            createdAt, updatedAt
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        verb
    ))
    .bind(&ticket.id)
    .bind(&ticket.name)
    .bind(&ticket.description)
    .bind(ticket.importance.map(Importance::get))
    .bind(ticket.status.as_str())
    .bind(&ticket.assignee)
    .bind(ticket.github_issue_number.map(|n| n as i64))
    .bind(ticket.github_pr_number.map(|n| n as i64))
    .bind(&ticket.github_repo_url)
    .bind(&ticket.created_at)
    .bind(&ticket.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Set status `resolved` and the PR number. Returns whether a row matched.
pub(crate) async fn resolve<'e, E>(executor: E, id: &str, pr_number: u64, now: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE tickets SET status = 'resolved', github_pr_number = ?, updatedAt = ? WHERE id = ?",
    )
    .bind(pr_number as i64)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn map_row(row: &SqliteRow) -> Result<Ticket> {
    let importance = row
        .try_get::<Option<i64>, _>("importance")?
        .map(Importance::new)
        .transpose()
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<TicketStatus>()
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;

    Ok(Ticket {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        importance,
        status,
        assignee: row.try_get("assignee")?,
        github_issue_number: row
            .try_get::<Option<i64>, _>("github_issue_number")?
            .map(|n| n as u64),
        github_pr_number: row
            .try_get::<Option<i64>, _>("github_pr_number")?
            .map(|n| n as u64),
        github_repo_url: row.try_get("github_repo_url")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}
