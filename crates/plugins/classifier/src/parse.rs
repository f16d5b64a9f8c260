//! Strict parsing of model output into ticket drafts.

use serde_json::Value;
use thiserror::Error;
use ticketbuddy_core::{Importance, TicketDraft};

/// Why model output was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no JSON array in model output")]
    NoArray,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("model returned an empty array")]
    Empty,

    #[error("element {index}: {reason}")]
    InvalidElement { index: usize, reason: String },
}

/// The substring from the first `[` to the last `]`, if any.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse model output into drafts. Every element must carry a non-blank
/// `title`, an integer `priority` in 1..=3 and a string `assignee`; a missing
/// or blank `description` defaults to `original`. One bad element rejects
/// the whole answer.
pub fn parse_drafts(output: &str, original: &str) -> Result<Vec<TicketDraft>, ParseError> {
    let array = extract_json_array(output).ok_or(ParseError::NoArray)?;
    let value: Value =
        serde_json::from_str(array).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let items = value.as_array().ok_or(ParseError::NoArray)?;
    if items.is_empty() {
        return Err(ParseError::Empty);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            parse_element(item, original)
                .map_err(|reason| ParseError::InvalidElement { index, reason })
        })
        .collect()
}

fn parse_element(item: &Value, original: &str) -> Result<TicketDraft, String> {
    let object = item.as_object().ok_or("not an object")?;

    let title = object
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing or blank title")?;

    let priority = object
        .get("priority")
        .and_then(Value::as_i64)
        .ok_or("priority must be an integer")?;
    let priority = Importance::new(priority).map_err(|e| e.to_string())?;

    let assignee = object
        .get("assignee")
        .and_then(Value::as_str)
        .ok_or("assignee must be a string")?;

    let description = object
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(original);

    Ok(TicketDraft {
        title: title.to_string(),
        description: description.to_string(),
        priority,
        assignee: assignee.to_string(),
    })
}
