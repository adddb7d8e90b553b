// crates/core/src/error.rs
//! Domain error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::JobId;

/// Errors from the job store and job state machine.
#[derive(Debug, Error)]
pub enum JobError {
    /// Rejected synchronously at creation; no job entity is persisted.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    /// A state transition that the lifecycle does not permit
    /// (e.g. dispatching a job that is not pending).
    #[error("invalid transition for job {id}: {message}")]
    InvalidTransition { id: JobId, message: String },

    #[error("job store lock poisoned")]
    LockPoisoned,
}

/// Errors resolving a file reference into sheet rows.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sheet has no data rows: {}", path.display())]
    Empty { path: PathBuf },

    #[error("invalid column reference '{column}'")]
    InvalidColumn { column: String },
}

/// Error from the external row-processing collaborator for a single row.
///
/// Absorbed locally by the worker: the row is recorded as failed and the
/// chunk moves on to the next row.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("empty response from model")]
    EmptyResponse,
}
