//! Ticket classification for TicketBuddy.
//!
//! Turns a free-text problem report into one or more [`TicketDraft`]s:
//!
//! 1. Ask the language model (if one is configured) for a JSON array of
//!    drafts.
//! 2. Validate the answer strictly ([`parse::parse_drafts`]).
//! 3. On any failure fall back to deterministic keyword rules
//!    ([`heuristics::classify`]).
//!
//! # Example
//!
//! ```ignore
//! use ticketbuddy_classifier::Classifier;
//!
//! let classifier = Classifier::new(None);
//! let result = classifier.classify("Users cannot log in").await;
//! assert!(!result.drafts().is_empty());
//! ```

pub mod chat;
pub mod heuristics;
pub mod parse;

use std::fmt;
use std::sync::Arc;

use ticketbuddy_core::{ChatMessage, LanguageModel, TicketDraft};
use tracing::{debug, warn};

pub use chat::ChatClient;
pub use heuristics::{Domain, OwnerRoster};
pub use parse::{extract_json_array, parse_drafts, ParseError};

/// Longest description forwarded to the model, in characters.
const MAX_PROMPT_CHARS: usize = 4000;

/// Why the keyword rules were used instead of the model.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoModel,
    ModelError(String),
    Unparseable(ParseError),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoModel => f.write_str("no language model configured"),
            FallbackReason::ModelError(e) => write!(f, "model call failed: {}", e),
            FallbackReason::Unparseable(e) => write!(f, "model output rejected: {}", e),
        }
    }
}

/// Outcome of classifying one description.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The model answered with valid drafts
    Parsed(Vec<TicketDraft>),
    /// The keyword rules produced the drafts
    Fallback {
        reason: FallbackReason,
        drafts: Vec<TicketDraft>,
    },
}

impl Classification {
    /// Drafts to persist; never empty.
    pub fn drafts(&self) -> &[TicketDraft] {
        match self {
            Classification::Parsed(drafts) => drafts,
            Classification::Fallback { drafts, .. } => drafts,
        }
    }

    pub fn into_drafts(self) -> Vec<TicketDraft> {
        match self {
            Classification::Parsed(drafts) => drafts,
            Classification::Fallback { drafts, .. } => drafts,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::Fallback { .. })
    }
}

/// Model-first classifier with a keyword fallback.
#[derive(Clone)]
pub struct Classifier {
    model: Option<Arc<dyn LanguageModel>>,
    roster: OwnerRoster,
}

impl Classifier {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            model,
            roster: OwnerRoster::default(),
        }
    }

    pub fn with_roster(mut self, roster: OwnerRoster) -> Self {
        self.roster = roster;
        self
    }

    pub fn roster(&self) -> &OwnerRoster {
        &self.roster
    }

    /// Classify `description`. Always yields at least one draft.
    pub async fn classify(&self, description: &str) -> Classification {
        let Some(model) = &self.model else {
            return self.fallback(description, FallbackReason::NoModel);
        };

        let messages = build_messages(description, &self.roster);
        let output = match model.complete(&messages).await {
            Ok(output) => output,
            Err(e) => return self.fallback(description, FallbackReason::ModelError(e.to_string())),
        };

        match parse_drafts(&output, description) {
            Ok(drafts) => {
                debug!(count = drafts.len(), "Model classification accepted");
                Classification::Parsed(drafts)
            }
            Err(e) => self.fallback(description, FallbackReason::Unparseable(e)),
        }
    }

    fn fallback(&self, description: &str, reason: FallbackReason) -> Classification {
        match &reason {
            FallbackReason::NoModel => debug!("Classifying with keyword rules"),
            other => warn!(reason = %other, "Falling back to keyword classification"),
        }
        Classification::Fallback {
            drafts: heuristics::classify(description, &self.roster),
            reason,
        }
    }
}

/// Prompt documenting the output format and the same rules the fallback
/// applies, so both paths agree on owners and priorities.
pub fn build_messages(description: &str, roster: &OwnerRoster) -> Vec<ChatMessage> {
    let system = format!(
        "You are a support triage assistant. Split the user's problem report into one or \
         more tickets and answer with ONLY a JSON array. Each element must be an object with \
         \"title\" (short, non-empty), \"description\", \"priority\" (integer 1, 2 or 3) and \
         \"assignee\" (string).\n\n\
         Priority: 3 when the report mentions security, payments, an outage or urgency; \
         2 when it is important, needed soon or affects core functionality; otherwise 1 \
         (cosmetic issues or no signal).\n\n\
         Owners: authentication and login -> {}; database -> {}; API and backend -> {}; \
         UI and frontend -> {}; mobile apps -> {}; anything else -> {}.",
        roster.authentication,
        roster.database,
        roster.api,
        roster.frontend,
        roster.mobile,
        roster.triage,
    );

    vec![
        ChatMessage::system(system),
        ChatMessage::user(truncate_chars(description, MAX_PROMPT_CHARS)),
    ]
}

/// Cut `s` to at most `max_chars` characters, on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
