//! `POST /github/webhook` ingestion.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use ticketbuddy_core::{now_timestamp, GitHubEvent};
use ticketbuddy_github::webhook::{
    verify_signature, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER,
};
use ticketbuddy_github::{MirrorUpdate, WebhookEvent};
use tracing::{debug, info, warn};

use crate::error::{parse_body, ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/github/webhook", post(receive_webhook))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Accept one delivery.
///
/// A signed delivery must verify against the configured secret. The mirror
/// upsert re-applies on redelivery; the event row is stored once per
/// delivery id.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let delivery_id = header(&headers, DELIVERY_HEADER)
        .ok_or_else(|| ApiError::BadRequest("Missing X-GitHub-Delivery header".to_string()))?
        .to_string();
    let event_type = header(&headers, EVENT_HEADER)
        .ok_or_else(|| ApiError::BadRequest("Missing X-GitHub-Event header".to_string()))?
        .to_string();

    if let Some(signature) = header(&headers, SIGNATURE_HEADER) {
        let secret = state.webhook_secret.as_deref().ok_or_else(|| {
            warn!(delivery = %delivery_id, "Signed delivery but no webhook secret configured");
            ApiError::Unauthorized("Webhook secret not configured".to_string())
        })?;
        if !verify_signature(secret, &body, signature) {
            warn!(delivery = %delivery_id, "Webhook signature mismatch");
            return Err(ApiError::Unauthorized("Invalid signature".to_string()));
        }
    }

    let payload: Value = parse_body(&body)?;
    let event = WebhookEvent::parse(&event_type, &payload)?;

    let mirrors = state.store.mirrors();
    match &event.mirror {
        Some(MirrorUpdate::PullRequest(pr)) => mirrors.upsert_pull_request(pr).await?,
        Some(MirrorUpdate::Issue(issue)) => mirrors.upsert_issue(issue).await?,
        None => {}
    }

    let recorded = state
        .store
        .events()
        .record(&GitHubEvent {
            id: delivery_id.clone(),
            repo_id: event.repo_id.clone(),
            event_type: event.event_type.clone(),
            summary: event.summary.clone(),
            payload: String::from_utf8_lossy(&body).into_owned(),
            created_at: now_timestamp(),
        })
        .await?;

    if recorded {
        info!(delivery = %delivery_id, event = %event.event_type, summary = %event.summary, "Webhook received");
    } else {
        debug!(delivery = %delivery_id, "Duplicate webhook delivery");
    }

    Ok(Json(json!({
        "ok": true,
        "duplicate": !recorded,
        "summary": event.summary,
    })))
}
