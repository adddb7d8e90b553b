// crates/core/src/store.rs
//! In-memory job store — the single source of truth for Job/Chunk state.
//!
//! Jobs for different uploads are fully independent, so the map itself only
//! needs a read/write lock; every mutation of one job's aggregate happens
//! under that job's own mutex, making `record_row` (chunk update + progress
//! recomputation) atomic with respect to concurrent readers and to writers
//! from the job's other chunks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::JobError;
use crate::job::{Job, JobSummary};
use crate::partition::RowRange;
use crate::types::{ColumnMapping, JobId, RowOutcome, RowRecord};

/// Bounds for `parallel_count`.
pub const MIN_PARALLEL: usize = 1;
pub const MAX_PARALLEL: usize = 10;

/// One source row paired with its recorded outcome (if attempted yet).
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub record: RowRecord,
    pub outcome: Option<RowOutcome>,
}

struct JobInner {
    job: Job,
    /// Source rows, resolved from the file reference at dispatch time.
    rows: Arc<Vec<RowRecord>>,
    /// Per-row outcomes, indexed by source row. Backs the result download.
    results: Vec<Option<RowOutcome>>,
}

struct JobEntry {
    inner: Mutex<JobInner>,
}

impl JobEntry {
    /// Run `f` under this job's lock. Poisoning is reported, not propagated —
    /// a panicked worker must not take the whole store down.
    fn with<T>(&self, f: impl FnOnce(&mut JobInner) -> T) -> Result<T, JobError> {
        match self.inner.lock() {
            Ok(mut guard) => Ok(f(&mut guard)),
            Err(e) => {
                tracing::error!("job mutex poisoned: {e}");
                Err(JobError::LockPoisoned)
            }
        }
    }
}

/// Create, persist, and serve Job/Chunk entities.
///
/// Terminal jobs are retained for read access (history, result download)
/// until externally purged.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<JobEntry>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a job in `pending` with no chunks yet.
    ///
    /// Rejects an incomplete column mapping, out-of-range parallelism, or an
    /// empty sheet without persisting anything.
    pub fn create_job(
        &self,
        file_ref: impl Into<String>,
        filename: impl Into<String>,
        column_mapping: ColumnMapping,
        parallel_count: usize,
        total_rows: usize,
    ) -> Result<Job, JobError> {
        column_mapping.validate().map_err(JobError::Validation)?;
        if !(MIN_PARALLEL..=MAX_PARALLEL).contains(&parallel_count) {
            return Err(JobError::Validation(format!(
                "parallel_count must be between {MIN_PARALLEL} and {MAX_PARALLEL}, got {parallel_count}"
            )));
        }
        if total_rows == 0 {
            return Err(JobError::Validation(
                "sheet has no data rows to process".to_string(),
            ));
        }

        let job = Job::new(
            file_ref.into(),
            filename.into(),
            column_mapping,
            parallel_count,
            total_rows,
        );
        let snapshot = job.clone();
        let entry = Arc::new(JobEntry {
            inner: Mutex::new(JobInner {
                job,
                rows: Arc::new(Vec::new()),
                results: Vec::new(),
            }),
        });

        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(snapshot.id, entry);
            }
            Err(e) => {
                tracing::error!("jobs map lock poisoned: {e}");
                return Err(JobError::LockPoisoned);
            }
        }
        tracing::info!(job_id = %snapshot.id, total_rows, parallel_count, "job created");
        Ok(snapshot)
    }

    fn entry(&self, id: JobId) -> Result<Arc<JobEntry>, JobError> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(&id).cloned().ok_or(JobError::NotFound(id)),
            Err(e) => {
                tracing::error!("jobs map lock poisoned: {e}");
                Err(JobError::LockPoisoned)
            }
        }
    }

    /// Point-in-time snapshot of one job.
    pub fn get(&self, id: JobId) -> Result<Job, JobError> {
        self.entry(id)?.with(|inner| inner.job.clone())
    }

    /// Job summaries, most recent first.
    pub fn list(&self) -> Vec<JobSummary> {
        let entries: Vec<Arc<JobEntry>> = match self.jobs.read() {
            Ok(jobs) => jobs.values().cloned().collect(),
            Err(e) => {
                tracing::error!("jobs map lock poisoned: {e}");
                return Vec::new();
            }
        };
        let mut summaries: Vec<JobSummary> = entries
            .iter()
            .filter_map(|e| e.with(|inner| inner.job.summary()).ok())
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Attach the resolved rows and partitioned ranges, moving the job
    /// `pending → processing`. Returns the updated snapshot.
    pub fn begin_processing(
        &self,
        id: JobId,
        rows: Arc<Vec<RowRecord>>,
        ranges: &[RowRange],
    ) -> Result<Job, JobError> {
        self.entry(id)?.with(|inner| {
            inner.job.begin_processing(ranges)?;
            inner.results = vec![None; rows.len()];
            inner.rows = rows;
            tracing::info!(job_id = %id, chunks = ranges.len(), "job dispatched");
            Ok(inner.job.clone())
        })?
    }

    /// Record one attempted row: store its outcome, bump the owning chunk's
    /// counters, and recompute the job aggregate — all atomically.
    ///
    /// Updates arriving after the job reached a terminal state are dropped:
    /// a cancelled job's chunks are frozen, not rolled back.
    pub fn record_row(
        &self,
        id: JobId,
        chunk_id: usize,
        row_index: usize,
        outcome: RowOutcome,
    ) -> Result<(), JobError> {
        self.entry(id)?.with(|inner| {
            if inner.job.is_terminal() {
                tracing::debug!(
                    job_id = %id,
                    chunk_id,
                    row_index,
                    status = %inner.job.status,
                    "dropping row update for terminal job"
                );
                return Ok(());
            }
            inner.job.apply_row(chunk_id)?;
            if let Some(slot) = inner.results.get_mut(row_index) {
                *slot = Some(outcome);
            }
            Ok(())
        })?
    }

    /// Force the job into `failed` (chunk-fatal escalation). No-op when the
    /// job is already terminal. Returns the resulting status.
    pub fn fail_job(
        &self,
        id: JobId,
        message: impl Into<String>,
    ) -> Result<crate::types::JobStatus, JobError> {
        let message = message.into();
        let status = self.entry(id)?.with(|inner| inner.job.fail(message.clone()))?;
        tracing::warn!(job_id = %id, %status, error = %message, "job failed");
        Ok(status)
    }

    /// Cancel an in-flight job. Idempotent: terminal jobs (including jobs
    /// that completed before the signal was observed) are left untouched and
    /// their current status is returned.
    pub fn cancel_job(&self, id: JobId) -> Result<crate::types::JobStatus, JobError> {
        let status = self.entry(id)?.with(|inner| inner.job.cancel())?;
        tracing::info!(job_id = %id, %status, "cancel requested");
        Ok(status)
    }

    /// Source rows paired with recorded outcomes, for the result download.
    pub fn result_rows(&self, id: JobId) -> Result<Vec<ResultRow>, JobError> {
        self.entry(id)?.with(|inner| {
            inner
                .rows
                .iter()
                .zip(inner.results.iter())
                .map(|(record, outcome)| ResultRow {
                    record: record.clone(),
                    outcome: outcome.clone(),
                })
                .collect()
        })
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
