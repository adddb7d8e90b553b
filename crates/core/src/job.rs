// crates/core/src/job.rs
//! Job and Chunk entities and their state machine.
//!
//! A `Job` is one user-submitted spreadsheet processing request. Its data rows
//! are partitioned into `Chunk`s, each processed by exactly one worker. All
//! aggregate fields (`progress`, `rows_processed`) are derived from chunk
//! state — callers never set them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::partition::RowRange;
use crate::types::{ChunkStatus, ColumnMapping, JobId, JobStatus};

/// A contiguous row-range subdivision of a job, owned by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable index 0..K-1 for the life of the job.
    pub id: usize,
    pub range: RowRange,
    pub status: ChunkStatus,
    pub rows_processed: usize,
}

impl Chunk {
    fn new(id: usize, range: RowRange) -> Self {
        Self {
            id,
            range,
            status: ChunkStatus::Pending,
            rows_processed: 0,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.range.len()
    }

    /// Percentage of this chunk's rows attempted, 0–100.
    pub fn progress(&self) -> u8 {
        percent(self.rows_processed, self.total_rows())
    }
}

/// One user-submitted spreadsheet processing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Opaque reference to the uploaded sheet, resolved by the sheet source.
    pub file_ref: String,
    pub filename: String,
    pub status: JobStatus,
    /// Derived overall progress, 0–100.
    pub progress: u8,
    pub column_mapping: ColumnMapping,
    /// Worker/chunk count, fixed at creation. Validated into [1,10].
    pub parallel_count: usize,
    /// Empty until partitioning; length == effective chunk count afterwards.
    pub chunks: Vec<Chunk>,
    pub total_rows: usize,
    pub rows_processed: usize,
    /// Coarse human-readable phase for the dashboard ("processing rows", ...).
    pub current_step: Option<String>,
    /// Set only when the job failed or was cancelled.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Lightweight job listing row, most-recent-first in `JobStore::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_rows: usize,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a job in `pending` with no chunks yet.
    ///
    /// Input validation (mapping completeness, parallelism bounds) happens in
    /// `JobStore::create_job` so that no invalid entity is ever constructed.
    pub(crate) fn new(
        file_ref: String,
        filename: String,
        column_mapping: ColumnMapping,
        parallel_count: usize,
        total_rows: usize,
    ) -> Self {
        Self {
            id: JobId::new_v4(),
            file_ref,
            filename,
            status: JobStatus::Pending,
            progress: 0,
            column_mapping,
            parallel_count,
            chunks: Vec::new(),
            total_rows,
            rows_processed: 0,
            current_step: None,
            error_message: None,
            created_at: Utc::now(),
            processing_started_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            filename: self.filename.clone(),
            status: self.status,
            progress: self.progress,
            total_rows: self.total_rows,
            created_at: self.created_at,
        }
    }

    /// Attach the partitioned chunks and move `pending → processing`.
    pub(crate) fn begin_processing(&mut self, ranges: &[RowRange]) -> Result<(), JobError> {
        if self.status != JobStatus::Pending {
            return Err(JobError::InvalidTransition {
                id: self.id,
                message: format!("cannot dispatch a {} job", self.status),
            });
        }
        debug_assert_eq!(
            ranges.iter().map(RowRange::len).sum::<usize>(),
            self.total_rows
        );
        self.chunks = ranges
            .iter()
            .enumerate()
            .map(|(i, r)| Chunk::new(i, *r))
            .collect();
        self.status = JobStatus::Processing;
        self.processing_started_at = Some(Utc::now());
        self.current_step = Some("processing rows".to_string());
        Ok(())
    }

    /// Record one attempted row for `chunk_id` and recompute the aggregate.
    ///
    /// Handles the chunk transitions: `pending → processing` on the first row
    /// and `processing → completed` when the range is exhausted. When the last
    /// chunk completes, the job itself transitions `processing → completed`.
    pub(crate) fn apply_row(&mut self, chunk_id: usize) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                id: self.id,
                message: format!("cannot record rows on a {} job", self.status),
            });
        }
        let id = self.id;
        let chunk = self
            .chunks
            .get_mut(chunk_id)
            .ok_or_else(|| JobError::InvalidTransition {
                id,
                message: format!("unknown chunk {chunk_id}"),
            })?;
        if chunk.rows_processed >= chunk.total_rows() {
            return Err(JobError::InvalidTransition {
                id,
                message: format!("chunk {chunk_id} already exhausted its range"),
            });
        }

        if chunk.status == ChunkStatus::Pending {
            chunk.status = ChunkStatus::Processing;
        }
        chunk.rows_processed += 1;
        if chunk.rows_processed == chunk.total_rows() {
            chunk.status = ChunkStatus::Completed;
        }

        self.recompute_aggregate();
        Ok(())
    }

    /// Mirror chunk counters into the job-level aggregate, and complete the
    /// job when every chunk has completed. Runs under the store's per-job
    /// lock, so readers never observe a chunk update without it.
    fn recompute_aggregate(&mut self) {
        self.rows_processed = self.chunks.iter().map(|c| c.rows_processed).sum();
        self.progress = percent(self.rows_processed, self.total_rows);

        let all_complete = !self.chunks.is_empty()
            && self.chunks.iter().all(|c| c.status == ChunkStatus::Completed);
        if all_complete {
            self.status = JobStatus::Completed;
            self.completed_at = Some(Utc::now());
            self.current_step = Some("completed".to_string());
        }
    }

    /// Force the job into `failed`. No-op if already terminal.
    pub(crate) fn fail(&mut self, message: impl Into<String>) -> JobStatus {
        if self.is_terminal() {
            return self.status;
        }
        self.status = JobStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.error_message = Some(message.into());
        self.status
    }

    /// Force the job into `cancelled`, freezing chunk state as-is.
    ///
    /// Idempotent: on an already-terminal job this returns the existing
    /// status unchanged — in particular a job that completed naturally before
    /// the cancel signal was observed stays `completed`.
    pub(crate) fn cancel(&mut self) -> JobStatus {
        if self.is_terminal() {
            return self.status;
        }
        self.status = JobStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        self.error_message = Some("cancelled by user".to_string());
        self.status
    }

    /// Index of the lowest unattempted row, for the dashboard's
    /// `current_row` display. `None` once every row has been attempted.
    pub fn current_row(&self) -> Option<usize> {
        self.chunks
            .iter()
            .filter(|c| c.rows_processed < c.total_rows())
            .map(|c| c.range.start + c.rows_processed)
            .min()
    }
}

/// `round(numerator / denominator * 100)` clamped to [0,100].
fn percent(numerator: usize, denominator: usize) -> u8 {
    if denominator == 0 {
        return 0;
    }
    let pct = (numerator as f64 / denominator as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}
