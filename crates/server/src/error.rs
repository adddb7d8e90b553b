// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use rowforge_core::{JobError, SheetError};

/// Structured JSON error response for API errors
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Job(job_err) => match job_err {
                JobError::Validation(msg) => {
                    tracing::warn!(message = %msg, "Job validation failed");
                    (
                        StatusCode::BAD_REQUEST,
                        ErrorResponse::with_details("Validation failed", msg.clone()),
                    )
                }
                JobError::NotFound(id) => {
                    tracing::warn!(job_id = %id, "Job not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                    )
                }
                JobError::InvalidTransition { id, message } => {
                    tracing::error!(job_id = %id, message = %message, "Invalid job transition");
                    (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_details("Invalid job state", message.clone()),
                    )
                }
                JobError::LockPoisoned => {
                    tracing::error!("Job store lock poisoned");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("Internal server error"),
                    )
                }
            },
            ApiError::Sheet(sheet_err) => {
                let (status, error_msg) = match sheet_err {
                    SheetError::NotFound { path } => {
                        tracing::warn!(path = %path.display(), "Sheet not found");
                        (StatusCode::BAD_REQUEST, "Uploaded file not found")
                    }
                    SheetError::Empty { path } => {
                        tracing::warn!(path = %path.display(), "Sheet has no data rows");
                        (StatusCode::BAD_REQUEST, "Sheet has no data rows")
                    }
                    SheetError::InvalidColumn { column } => {
                        tracing::warn!(column = %column, "Invalid column reference");
                        (StatusCode::BAD_REQUEST, "Invalid column reference")
                    }
                    SheetError::Io { path, source } => {
                        tracing::error!(path = %path.display(), error = %source, "IO error reading sheet");
                        (StatusCode::INTERNAL_SERVER_ERROR, "IO error reading sheet")
                    }
                };
                (
                    status,
                    ErrorResponse::with_details(error_msg, sheet_err.to_string()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Conflict");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Conflict", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
