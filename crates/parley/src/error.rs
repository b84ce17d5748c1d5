use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use parley_core::{RelayError, ValidationError};
use thiserror::Error;

use crate::store::StoreError;

/// An error answered by the chat endpoints.
///
/// The bodies are fixed plain-text strings; details only go to the logs.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request body was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The request carries no valid session.
    #[error("authentication required")]
    Unauthorized,
    /// The upstream failed before the response started.
    #[error(transparent)]
    Upstream(#[from] RelayError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ChatError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "Valid message is required")
            }
            ChatError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Authentication required")
            }
            ChatError::Upstream(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };
        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

/// An error answered by the JSON endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The request carries no valid session.
    #[error("authentication required")]
    Unauthorized,
    /// The addressed resource does not exist for this user.
    #[error("not found: {0}")]
    NotFound(String),
    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(message) => {
                error!("internal error: {message}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (code, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Backend(message) => ApiError::Internal(message),
        }
    }
}
