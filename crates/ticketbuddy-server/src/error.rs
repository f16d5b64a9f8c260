//! Error responses for the HTTP surface.
//!
//! Every failure leaves the server as `{"error": "<message>"}`.

use std::any::Any;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use ticketbuddy_core::Error;
use ticketbuddy_github::MergeFailure;
use ticketbuddy_storage::StorageError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid input
    #[error("{0}")]
    BadRequest(String),

    /// Bad webhook signature
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// GitHub or the language model answered with an error, or could not be
    /// reached at all (502)
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    /// A collaborator the route needs is not configured
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound("not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn upstream(status: Option<u16>, message: String) -> Self {
        let status = status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        ApiError::Upstream { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidData(message) => ApiError::BadRequest(message),
            Error::Http(message) => ApiError::upstream(None, message),
            Error::Unauthorized(ref message) | Error::NotFound(ref message) => {
                ApiError::upstream(err.upstream_status(), message.clone())
            }
            Error::Api { status, message } => ApiError::upstream(Some(status), message),
            Error::Config(message) => ApiError::Unavailable(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MergeFailure> for ApiError {
    fn from(err: MergeFailure) -> Self {
        match err {
            MergeFailure::Upstream(inner) => inner.into(),
            other => ApiError::upstream(other.status(), other.to_string()),
        }
    }
}

/// Decode a JSON request body.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Decode a JSON request body that may be left out entirely.
pub fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        parse_body(body)
    }
}

/// Turn a caught panic into the usual 500 body.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "internal error".to_string()
    };
    ApiError::Internal(message).into_response()
}
