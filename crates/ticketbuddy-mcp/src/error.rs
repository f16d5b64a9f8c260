//! Tool execution errors. They never become JSON-RPC errors; the handler
//! renders them as `isError` text results.

/// Why a tool call failed.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The HTTP API answered with a non-success status.
    #[error("API request failed: {status} {reason} - {body}")]
    Api {
        status: u16,
        reason: String,
        body: String,
    },

    /// The HTTP API could not be reached.
    #[error("API request failed: {0}")]
    Transport(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid repo format: {0}. Expected format: owner/name")]
    InvalidRepo(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
