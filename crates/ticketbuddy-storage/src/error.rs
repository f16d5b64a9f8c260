//! Error types for store operations.

use thiserror::Error;

/// Store error type.
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value no longer satisfies the domain rules
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<StorageError> for ticketbuddy_core::Error {
    fn from(err: StorageError) -> Self {
        ticketbuddy_core::Error::Storage(err.to_string())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;
