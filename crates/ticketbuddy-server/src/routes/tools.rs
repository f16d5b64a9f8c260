//! Diagnostic tool invocation and the dashboard copilot.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use ticketbuddy_core::{ChatMessage, ChatRole};
use tracing::warn;

use crate::diagnostics::{self, DEFAULT_SERVICE, TOOL_NAME};
use crate::error::{parse_body, ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mcp/call-tool", post(call_tool))
        .route("/copilot", post(copilot))
}

#[derive(Deserialize)]
struct CallToolBody {
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    args: Value,
}

/// POST /mcp/call-tool
async fn call_tool(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body: CallToolBody = parse_body(&body)?;
    if body.tool.as_deref() != Some(TOOL_NAME) {
        return Err(ApiError::BadRequest("Unknown tool".to_string()));
    }

    let service = body
        .args
        .get("service")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SERVICE);

    let report = diagnostics::summarize_service_health(
        &state.store,
        state.model.as_deref(),
        state.log_sample.as_deref(),
        service,
    )
    .await?;

    Ok(Json(json!(report)))
}

#[derive(Deserialize)]
struct CopilotBody {
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    context: CopilotContext,
}

#[derive(Deserialize, Default)]
struct CopilotContext {
    #[serde(default)]
    page: Option<String>,
    #[serde(default, rename = "ticketsCount")]
    tickets_count: Option<u64>,
    #[serde(default, rename = "githubConnected")]
    github_connected: Option<bool>,
}

fn copilot_prompt(context: &CopilotContext) -> String {
    let mut prompt = String::from(
        "You are TicketBuddy Copilot, an assistant inside a ticket tracking dashboard. \
         Help with tickets, triage, GitHub pull requests and issues, and incident analysis. \
         Keep answers short and practical.",
    );
    if let Some(page) = &context.page {
        prompt.push_str(&format!("\nThe user is on the {} page.", page));
    }
    if let Some(count) = context.tickets_count {
        prompt.push_str(&format!("\nThere are {} tickets.", count));
    }
    if let Some(connected) = context.github_connected {
        let state = if connected { "linked" } else { "not linked" };
        prompt.push_str(&format!("\nA GitHub repository is {}.", state));
    }
    prompt
}

/// POST /copilot
async fn copilot(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body: CopilotBody = parse_body(&body)?;
    if !body.messages.iter().any(|m| m.role == ChatRole::User) {
        return Err(ApiError::BadRequest(
            "messages must include a user message".to_string(),
        ));
    }

    let model = state
        .model
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Language model not configured".to_string()))?;

    let mut messages = Vec::with_capacity(body.messages.len() + 1);
    messages.push(ChatMessage::system(copilot_prompt(&body.context)));
    messages.extend(
        body.messages
            .into_iter()
            .filter(|m| m.role != ChatRole::System),
    );

    let response = model.complete(&messages).await.map_err(|e| {
        warn!(error = %e, "Copilot model call failed");
        ApiError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: format!("Language model request failed: {}", e),
        }
    })?;

    Ok(Json(json!({ "response": response })))
}
