//! Route table.
//!
//! Routes are resolved by axum's matcher, where static segments always win
//! over captures, so `/github/summary` can never be shadowed by
//! `/github/{owner}/{name}/...` whatever the declaration order.

mod github;
mod incidents;
mod tickets;
mod tools;
mod webhook;

use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::cors::cors_middleware;
use crate::error::{panic_response, ApiError};
use crate::state::AppState;

/// Build the complete HTTP surface.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(tickets::routes())
        .merge(incidents::routes())
        .merge(tools::routes())
        .merge(github::routes())
        .merge(webhook::routes())
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found()
}
