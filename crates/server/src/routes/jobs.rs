// crates/server/src/routes/jobs.rs
//! API routes for spreadsheet processing jobs.
//!
//! - POST   /jobs                      — Create a job and dispatch workers
//! - GET    /jobs                      — List job summaries, newest first
//! - GET    /jobs/{id}                 — Full job detail for polling clients
//! - DELETE /jobs/{id}/cancel          — Cancel an in-flight job (idempotent)
//! - GET    /jobs/{id}/download/result — Download the result sheet (CSV)

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use rowforge_core::{ColumnMapping, Job, JobId, JobStatus, JobSummary, ResultRow, RowOutcome};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Request body for POST /api/jobs.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Opaque reference to a previously uploaded file.
    pub file_ref: String,
    /// Display name for listings; defaults to the file reference.
    pub filename: Option<String>,
    pub column_mapping: ColumnMapping,
    /// Worker count, 1–10.
    #[serde(default = "default_parallel_count")]
    pub parallel_count: usize,
}

fn default_parallel_count() -> usize {
    1
}

/// Response for POST /api/jobs (202 Accepted).
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: String,
}

/// One row of GET /api/jobs.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct JobSummaryResponse {
    pub id: String,
    pub filename: String,
    pub status: String,
    pub progress: u8,
    pub total_rows: usize,
    pub created_at: String,
}

impl From<JobSummary> for JobSummaryResponse {
    fn from(s: JobSummary) -> Self {
        Self {
            id: s.id.to_string(),
            filename: s.filename,
            status: s.status.to_string(),
            progress: s.progress,
            total_rows: s.total_rows,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

/// Per-chunk breakdown, rendered by the dashboard when parallel_count > 1.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ChunkResponse {
    pub id: usize,
    pub status: String,
    pub progress: u8,
    pub rows_processed: usize,
    pub total_rows: usize,
    pub start_row: usize,
    pub end_row: usize,
}

/// Execution metadata block of the job detail view.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct JobMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_row: Option<usize>,
    pub rows_processed: usize,
    pub total_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub parallel_count: usize,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
}

/// Response for GET /api/jobs/{id}.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct JobDetailResponse {
    pub id: String,
    pub file_ref: String,
    pub filename: String,
    pub status: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub chunks: Vec<ChunkResponse>,
    pub meta_data: JobMetaData,
}

impl From<Job> for JobDetailResponse {
    fn from(job: Job) -> Self {
        let meta_data = JobMetaData {
            current_row: job.current_row(),
            rows_processed: job.rows_processed,
            total_rows: job.total_rows,
            current_step: job.current_step.clone(),
            parallel_count: job.parallel_count,
            created_at: job.created_at.to_rfc3339(),
            processing_started_at: job.processing_started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            failed_at: job.failed_at.map(|t| t.to_rfc3339()),
            cancelled_at: job.cancelled_at.map(|t| t.to_rfc3339()),
        };
        Self {
            id: job.id.to_string(),
            file_ref: job.file_ref,
            filename: job.filename,
            status: job.status.to_string(),
            progress: job.progress,
            error_message: job.error_message,
            chunks: job
                .chunks
                .iter()
                .map(|c| ChunkResponse {
                    id: c.id,
                    status: c.status.to_string(),
                    progress: c.progress(),
                    rows_processed: c.rows_processed,
                    total_rows: c.total_rows(),
                    start_row: c.range.start,
                    end_row: c.range.end,
                })
                .collect(),
            meta_data,
        }
    }
}

/// Response for DELETE /api/jobs/{id}/cancel.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct CancelJobResponse {
    pub job_id: String,
    pub status: String,
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_job_id(id: &str) -> ApiResult<JobId> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("'{id}' is not a job id")))
}

/// POST /api/jobs — Create a job and start processing.
///
/// Validation failures (incomplete mapping, out-of-range parallelism,
/// unreadable or empty sheet) are rejected here, before any entity exists.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let rows = state
        .sheets
        .load(&request.file_ref, &request.column_mapping)
        .await?;

    let filename = request
        .filename
        .unwrap_or_else(|| request.file_ref.clone());
    let job = state.store.create_job(
        request.file_ref,
        filename,
        request.column_mapping,
        request.parallel_count,
        rows.len(),
    )?;
    state.runner.dispatch(&job, rows)?;

    tracing::info!(job_id = %job.id, parallel_count = job.parallel_count, "job accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id: job.id.to_string(),
            status: JobStatus::Pending.to_string(),
        }),
    ))
}

/// GET /api/jobs — List job summaries, most recent first.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSummaryResponse>> {
    Json(state.store.list().into_iter().map(Into::into).collect())
}

/// GET /api/jobs/{id} — Full job detail for polling clients.
///
/// Read-only snapshot; never blocks on in-flight workers.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobDetailResponse>> {
    let job = state.store.get(parse_job_id(&id)?)?;
    Ok(Json(job.into()))
}

/// DELETE /api/jobs/{id}/cancel — Cancel an in-flight job.
///
/// Idempotent: 200 whether or not the job was still active; the body carries
/// the job's actual terminal status.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelJobResponse>> {
    let job_id = parse_job_id(&id)?;
    let status = state.runner.cancel(job_id)?;
    Ok(Json(CancelJobResponse {
        job_id: job_id.to_string(),
        status: status.to_string(),
    }))
}

/// GET /api/jobs/{id}/download/result — Download the processed sheet.
///
/// Only meaningful once the job completed; earlier requests get 409 without
/// touching job state.
async fn download_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let job_id = parse_job_id(&id)?;
    let job = state.store.get(job_id)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "result not ready: job is {}",
            job.status
        )));
    }

    let csv = build_result_csv(&state.store.result_rows(job_id)?);
    let filename = format!(
        "{}_result.csv",
        job.filename.trim_end_matches(".csv").trim_end_matches(".xlsx")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Build the result CSV with RFC 4180 escaping.
fn build_result_csv(rows: &[ResultRow]) -> String {
    let mut csv = String::new();
    csv.push_str("row,original_product_name,refined_product_name,keyword,category,error\n");

    for row in rows {
        let (refined, keywords, category, error) = match &row.outcome {
            Some(RowOutcome::Ok(output)) => (
                output.refined_name.as_str(),
                output.keywords.as_str(),
                output.category.as_str(),
                "",
            ),
            // Failed rows keep blank output cells and carry the error.
            Some(RowOutcome::Failed { error }) => ("", "", "", error.as_str()),
            None => ("", "", "", "not processed"),
        };
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            row.record.index + 1,
            escape_csv_field(&row.record.original_name),
            escape_csv_field(refined),
            escape_csv_field(keywords),
            escape_csv_field(category),
            escape_csv_field(error),
        ));
    }

    csv
}

/// Escape a CSV field per RFC 4180.
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", delete(cancel_job))
        .route("/jobs/{id}/download/result", get(download_result))
}
