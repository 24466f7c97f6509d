//! HTTP error responses with a structured JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imagelab_session::LabError;
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Nothing to undo")]
    EmptyHistory,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            Self::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                detail.clone(),
            ),
            Self::UnknownOperation(name) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_OPERATION",
                format!("Unknown operation `{name}`"),
            ),
            Self::InvalidParameter(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_PARAMETER",
                detail.clone(),
            ),
            Self::EmptyHistory => (
                StatusCode::CONFLICT,
                "EMPTY_HISTORY",
                "No operations to undo".to_string(),
            ),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            Self::Internal(detail) => {
                tracing::error!(detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<LabError> for ApiError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::Validation(_) => Self::BadRequest(err.to_string()),
            LabError::UploadTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            LabError::UnknownOperation(name) => Self::UnknownOperation(name),
            LabError::InvalidParameter { .. } => Self::InvalidParameter(err.to_string()),
            LabError::EmptyHistory => Self::EmptyHistory,
            LabError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            LabError::Storage(_) | LabError::Image(_) | LabError::LockPoisoned => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}
