//! Error types for TicketBuddy.

use thiserror::Error;

/// Main error type for TicketBuddy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(String),

    /// Upstream rejected our credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Upstream resource or local row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// API returned an error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Input or response failed validation
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map an upstream HTTP status and body to an error.
    ///
    /// GitHub error bodies look like `{"message": "..."}`; when the body has
    /// that shape only the message is kept.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = upstream_message(&body).unwrap_or(body);

        match status {
            401 | 403 => Error::Unauthorized(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }

    /// HTTP status of the upstream response, when there was one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized(_) => Some(401),
            Error::NotFound(_) => Some(404),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Result type alias for TicketBuddy operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_extracts_message() {
        let err = Error::from_status(409, r#"{"message":"Head branch was modified"}"#);
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Head branch was modified");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_keeps_plain_body() {
        let err = Error::from_status(500, "boom");
        assert!(matches!(err, Error::Api { status: 500, ref message } if message == "boom"));
    }

    #[test]
    fn test_from_status_auth_and_not_found() {
        assert!(matches!(Error::from_status(401, ""), Error::Unauthorized(_)));
        assert!(matches!(Error::from_status(403, ""), Error::Unauthorized(_)));
        assert!(matches!(Error::from_status(404, ""), Error::NotFound(_)));
    }

    #[test]
    fn test_upstream_status() {
        assert_eq!(Error::from_status(405, "x").upstream_status(), Some(405));
        assert_eq!(Error::Http("down".into()).upstream_status(), None);
    }
}
