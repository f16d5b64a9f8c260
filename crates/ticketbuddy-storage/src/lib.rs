//! Relational store for TicketBuddy.
//!
//! A single SQLite database holds tickets, incidents, the linked repository,
//! received webhook deliveries and the pull request / issue mirrors. Each
//! table has a small repository type that borrows a clone of the pool:
//!
//! ```ignore
//! use ticketbuddy_storage::Store;
//!
//! let store = Store::connect("/var/lib/ticketbuddy/ticketbuddy.db").await?;
//! let tickets = store.tickets().list().await?;
//! ```

pub mod error;
pub mod github;
pub mod incidents;
pub mod tickets;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::ConnectOptions;
use ticketbuddy_core::{now_timestamp, Ticket};
use tracing::{debug, info};

pub use error::{Result, StorageError};
pub use github::{EventsRepo, MirrorsRepo, OpenCounts, RepoLinkRepo};
pub use incidents::{IncidentQuery, IncidentsRepo};
pub use tickets::TicketsRepo;

/// Connection pool plus embedded migrations.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database file at `path` and migrate it.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(format!("Failed to create database directory: {}", e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = ?path, "Database opened");
        Self::migrated(pool).await
    }

    /// Private in-memory database, used by tests and dry runs.
    ///
    /// The pool holds exactly one connection that never expires, since every
    /// new `:memory:` connection would see an empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Migrations applied");
        Ok(Self { pool })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tickets(&self) -> TicketsRepo {
        TicketsRepo::new(self.pool.clone())
    }

    pub fn incidents(&self) -> IncidentsRepo {
        IncidentsRepo::new(self.pool.clone())
    }

    pub fn repo_link(&self) -> RepoLinkRepo {
        RepoLinkRepo::new(self.pool.clone())
    }

    pub fn events(&self) -> EventsRepo {
        EventsRepo::new(self.pool.clone())
    }

    pub fn mirrors(&self) -> MirrorsRepo {
        MirrorsRepo::new(self.pool.clone())
    }

    /// Record the local side of a successful upstream merge.
    ///
    /// Marks the pull request mirror closed and merged and, when `ticket_id`
    /// is given, resolves that ticket with the PR number. Both writes commit
    /// together or not at all. Returns the updated ticket, if one was named
    /// and exists.
    pub async fn merge_resolution(
        &self,
        repo_id: &str,
        pr_number: u64,
        ticket_id: Option<&str>,
    ) -> Result<Option<Ticket>> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        github::mark_merged(&mut *tx, repo_id, pr_number, &now).await?;

        let resolved = match ticket_id {
            Some(id) => tickets::resolve(&mut *tx, id, pr_number, &now).await?,
            None => false,
        };

        tx.commit().await?;
        debug!(repo_id, pr_number, ?ticket_id, resolved, "Merge recorded locally");

        match ticket_id {
            Some(id) if resolved => self.tickets().get(id).await,
            _ => Ok(None),
        }
    }
}
