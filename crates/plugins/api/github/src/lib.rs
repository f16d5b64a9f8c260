//! GitHub bridge for TicketBuddy.
//!
//! This crate talks to the GitHub REST API on behalf of the edge handler,
//! verifies webhook signatures, and maps upstream pull requests and issues
//! onto the local mirror rows shared by the webhook, list and poll paths.

mod client;
mod mirror;
mod repo;
mod types;
pub mod webhook;

pub use client::{GitHubClient, MergeFailure};
pub use repo::RepoRef;
pub use types::*;
pub use webhook::{MirrorUpdate, WebhookEvent};
