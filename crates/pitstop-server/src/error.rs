//! API error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pitstop_pool::ExecuteError;
use serde_json::json;

/// An error a handler can return.
#[derive(Debug)]
pub enum ApiError {
    /// The requested row does not exist.
    NotFound,
    /// A handler-level failure (bad payload, missing returned row).
    Internal(String),
    /// The pool or the statement failed.
    Database(ExecuteError),
}

impl From<ExecuteError> for ApiError {
    fn from(e: ExecuteError) -> Self {
        Self::Database(e)
    }
}

impl From<pitstop_client::Error> for ApiError {
    fn from(e: pitstop_client::Error) -> Self {
        Self::Database(ExecuteError::Query(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %message, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
