//! MCP (Model Context Protocol) adapter for TicketBuddy.
//!
//! Speaks line-delimited JSON-RPC 2.0 on stdin/stdout and turns each tool
//! call into one request against the TicketBuddy HTTP API.

pub mod api;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod transport;

pub use api::ApiClient;
pub use error::ToolError;
pub use server::McpServer;
