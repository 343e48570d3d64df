//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It implements
//! `axum::response::IntoResponse` to produce structured JSON error responses
//! with appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use flowdesk_core::error::CoreError;
use flowdesk_storage::StorageError;
use flowdesk_view::ViewError;

use crate::canvas::CanvasError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CYCLE_REJECTED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g., the path a cycle would close).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The edit was refused before any patch was built (422).
    #[error("validation failed: {message}")]
    ValidationFailed {
        code: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Resource conflict (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The action cannot be inverted (409).
    #[error("cannot undo: {0}")]
    CannotUndo(String),

    /// The gateway failed to save; the batch is kept for retry (503).
    #[error("changes not saved: {0}")]
    NotSaved(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None),
            ApiError::ValidationFailed {
                code,
                message,
                details,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                *code,
                message.clone(),
                details.clone(),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            ApiError::CannotUndo(msg) => (StatusCode::CONFLICT, "CANNOT_UNDO", msg.clone(), None),
            ApiError::NotSaved(msg) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_SAVED", msg.clone(), None),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
                None,
            ),
        }
    }

    fn validation(code: &'static str, message: String) -> Self {
        ApiError::ValidationFailed {
            code,
            message,
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();
        let detail = ApiErrorDetail {
            code: code.to_string(),
            message,
            details,
        };

        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NodeNotFound { .. } | CoreError::EdgeNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            CoreError::DuplicateNode { .. } | CoreError::DuplicateEdge { .. } => {
                ApiError::Conflict(err.to_string())
            }
            CoreError::DuplicateConnection { .. } => {
                ApiError::validation("DUPLICATE_CONNECTION", err.to_string())
            }
            CoreError::DanglingEdge { .. } => ApiError::validation("DANGLING_EDGE", err.to_string()),
            CoreError::InvalidPosition { .. } | CoreError::InvalidViewport { .. } => {
                ApiError::validation("INVALID_GEOMETRY", err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DiagramNotFound(_) | StorageError::TaskNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StorageError::Rejected(core) => core.into(),
            StorageError::IntegrityError { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<CanvasError> for ApiError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::DiagramNotFound(_)
            | CanvasError::NodeNotFound(_)
            | CanvasError::EdgeNotFound(_) => ApiError::NotFound(err.to_string()),
            CanvasError::CycleRejected { ref path, .. } => ApiError::ValidationFailed {
                code: "CYCLE_REJECTED",
                message: err.to_string(),
                details: Some(serde_json::json!({ "path": path })),
            },
            CanvasError::DuplicateConnection { ref existing, .. } => ApiError::ValidationFailed {
                code: "DUPLICATE_CONNECTION",
                message: err.to_string(),
                details: Some(serde_json::json!({ "existing": existing })),
            },
            CanvasError::NotDragging(_) => ApiError::BadRequest(err.to_string()),
            CanvasError::CannotUndo { .. } => ApiError::CannotUndo(err.to_string()),
            CanvasError::NotSaved(_) => ApiError::NotSaved(err.to_string()),
            CanvasError::UnsavedPending => ApiError::Conflict(err.to_string()),
            CanvasError::Rejected(core) => core.into(),
            CanvasError::Storage(storage) => storage.into(),
        }
    }
}

impl From<ViewError> for ApiError {
    fn from(err: ViewError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
