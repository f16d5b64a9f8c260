//! Shared helpers for the HTTP surface tests.
//!
//! Each test builds its own router over a private in-memory store. GitHub is
//! an `httpmock` server; the language model is a `mockall` mock.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use mockall::mock;
use serde_json::{json, Value};
use ticketbuddy_core::{ChatMessage, LanguageModel, Result};
use ticketbuddy_github::GitHubClient;
use ticketbuddy_server::{router, AppState};
use ticketbuddy_storage::Store;
use tower::ServiceExt;

mock! {
    pub Model {}

    #[async_trait]
    impl LanguageModel for Model {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
    }
}

pub const WEBHOOK_SECRET: &str = "webhook-test-secret";

/// State over a fresh in-memory store with nothing else configured.
pub async fn bare_state() -> AppState {
    AppState::new(Store::in_memory().await.unwrap())
}

/// State whose GitHub client points at `base_url`.
pub async fn github_state(base_url: &str) -> AppState {
    bare_state()
        .await
        .with_github(GitHubClient::with_base_url(base_url, "test-token"))
        .with_webhook_secret(Some(WEBHOOK_SECRET.to_string()))
}

/// State whose language model always answers `reply`.
pub async fn model_state(reply: &'static str) -> AppState {
    let mut model = MockModel::new();
    model
        .expect_complete()
        .returning(move |_| Ok(reply.to_string()));
    bare_state()
        .await
        .with_model(Some(Arc::new(model) as Arc<dyn LanguageModel>))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> TestResponse {
    send_json(app, Method::POST, uri, body).await
}

pub async fn patch(app: &Router, uri: &str, body: Value) -> TestResponse {
    send_json(app, Method::PATCH, uri, body).await
}

pub fn app(state: AppState) -> Router {
    router(state)
}

// =============================================================================
// GitHub fixtures
// =============================================================================

pub fn repository_json(full_name: &str) -> Value {
    json!({
        "full_name": full_name,
        "html_url": format!("https://github.com/{}", full_name),
        "default_branch": "main",
        "private": false
    })
}

pub fn pull_request_json(number: u64, title: &str) -> Value {
    json!({
        "number": number,
        "title": title,
        "state": "open",
        "html_url": format!("https://github.com/octo/shop/pull/{}", number),
        "user": {"id": 1, "login": "octocat"},
        "head": {"ref": "fix-billing", "sha": "a12f9c"},
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z"
    })
}

pub fn issue_json(number: u64, title: &str) -> Value {
    json!({
        "number": number,
        "title": title,
        "body": format!("{} (reported by support)", title),
        "state": "open",
        "html_url": format!("https://github.com/octo/shop/issues/{}", number),
        "user": {"id": 2, "login": "hubot"},
        "labels": [{"name": "bug"}],
        "created_at": "2024-05-02T10:00:00Z",
        "updated_at": "2024-05-02T10:00:00Z"
    })
}
