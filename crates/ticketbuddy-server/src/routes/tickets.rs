use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use ticketbuddy_core::{Importance, NewTicket, Ticket, TicketPatch, TicketStatus};
use tracing::{debug, info};

use crate::error::{parse_body, ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_tickets))
        .route("/tickets/{id}", get(get_ticket).patch(update_ticket))
}

#[derive(Deserialize)]
struct CreateTicketBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default)]
    assignee: Option<String>,
}

#[derive(Deserialize)]
struct UpdateTicketBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
}

impl UpdateTicketBody {
    /// Validate every field before anything is written.
    fn into_patch(self) -> ApiResult<TicketPatch> {
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(ApiError::BadRequest("description cannot be empty".to_string()));
            }
        }

        let patch = TicketPatch {
            name: self.name,
            description: self.description,
            importance: self.importance.map(Importance::new).transpose()?,
            status: self
                .status
                .as_deref()
                .map(str::parse::<TicketStatus>)
                .transpose()?,
            assignee: self.assignee,
        };

        if patch.is_empty() {
            return Err(ApiError::BadRequest("No fields to update".to_string()));
        }
        Ok(patch)
    }
}

/// GET /tickets
async fn list_tickets(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let tickets = state.store.tickets().list().await?;
    Ok(Json(json!({ "tickets": tickets })))
}

/// GET /tickets/{id}
async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let ticket = state
        .store
        .tickets()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", id)))?;
    Ok(Json(json!({ "ticket": ticket })))
}

/// POST /tickets
///
/// With a `name` the ticket is stored exactly as submitted; otherwise the
/// description is split into tickets by the classifier.
async fn create_tickets(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body: CreateTicketBody = parse_body(&body)?;

    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::BadRequest("description is required".to_string()))?
        .to_string();

    let new_tickets: Vec<NewTicket> = match body.name.filter(|n| !n.trim().is_empty()) {
        Some(name) => vec![NewTicket {
            name: Some(name),
            description,
            importance: body.importance.map(Importance::new).transpose()?,
            assignee: body.assignee.filter(|a| !a.trim().is_empty()),
            ..Default::default()
        }],
        None => {
            let classification = state.classifier.classify(&description).await;
            debug!(fallback = classification.is_fallback(), "Description classified");
            classification
                .into_drafts()
                .into_iter()
                .map(NewTicket::from)
                .collect()
        }
    };

    let repo = state.store.tickets();
    let mut created: Vec<Ticket> = Vec::with_capacity(new_tickets.len());
    for new in new_tickets {
        created.push(repo.create(new).await?);
    }
    info!(count = created.len(), "Tickets created");

    Ok(Json(json!({
        "success": true,
        "count": created.len(),
        "tickets": created,
    })))
}

/// PATCH /tickets/{id}
async fn update_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let patch = parse_body::<UpdateTicketBody>(&body)?.into_patch()?;

    let ticket = state
        .store
        .tickets()
        .update(&id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", id)))?;

    Ok(Json(json!({ "success": true, "ticket": ticket })))
}
