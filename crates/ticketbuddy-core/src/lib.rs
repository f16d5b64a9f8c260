//! Core types, error handling and configuration for TicketBuddy.
//!
//! This crate provides the foundational abstractions shared by the store,
//! the GitHub bridge, the classifier and the HTTP edge handler.

pub mod config;
pub mod error;
pub mod ids;
pub mod provider;
pub mod types;

pub use config::{Config, Secrets};
pub use error::{Error, Result};
pub use provider::{ChatMessage, ChatRole, LanguageModel};
pub use types::*;
