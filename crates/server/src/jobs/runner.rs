// crates/server/src/jobs/runner.rs
//! Worker pool that processes a job's chunks concurrently.
//!
//! One tokio task per chunk, so the pool size for a job equals its chunk
//! count (at most 10). Each worker owns exactly one chunk for its lifetime
//! and walks its row range in order; cross-chunk completion order is
//! unspecified. Cancellation is cooperative: workers check the job's
//! `CancellationToken` between rows, never mid-row.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use rowforge_core::{
    partition, Job, JobError, JobId, JobStatus, JobStore, RowOutcome, RowProcessor, RowRange,
    RowRecord,
};

/// Dispatches jobs onto worker tasks and routes cancel requests to them.
pub struct JobRunner {
    store: Arc<JobStore>,
    processor: Arc<dyn RowProcessor>,
    row_timeout: Duration,
    /// Cancellation tokens for in-flight jobs, removed when the pool drains.
    active: RwLock<HashMap<JobId, CancellationToken>>,
}

impl JobRunner {
    pub fn new(
        store: Arc<JobStore>,
        processor: Arc<dyn RowProcessor>,
        row_timeout: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            row_timeout,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Partition the job's rows, move it to `processing`, and spawn one
    /// worker per chunk.
    pub fn dispatch(&self, job: &Job, rows: Vec<RowRecord>) -> Result<(), JobError> {
        let ranges = partition(rows.len(), job.parallel_count);
        let rows = Arc::new(rows);
        self.store.begin_processing(job.id, Arc::clone(&rows), &ranges)?;

        let token = CancellationToken::new();
        match self.active.write() {
            Ok(mut active) => {
                active.insert(job.id, token.clone());
            }
            Err(e) => {
                tracing::error!("active map lock poisoned: {e}");
                return Err(JobError::LockPoisoned);
            }
        }

        let job_id = job.id;
        let mut workers = JoinSet::new();
        for (chunk_id, range) in ranges.into_iter().enumerate() {
            workers.spawn(run_chunk(
                Arc::clone(&self.store),
                Arc::clone(&self.processor),
                token.clone(),
                self.row_timeout,
                job_id,
                chunk_id,
                Arc::clone(&rows),
                range,
            ));
        }

        // Supervisor: drain the pool and log the final status.
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while let Some(res) = workers.join_next().await {
                if let Err(e) = res {
                    tracing::error!(job_id = %job_id, error = %e, "worker task panicked");
                    let _ = store.fail_job(job_id, format!("worker crashed: {e}"));
                }
            }
            match store.get(job_id) {
                Ok(job) => {
                    tracing::info!(job_id = %job_id, status = %job.status, "worker pool drained")
                }
                Err(e) => tracing::error!(job_id = %job_id, error = %e, "job vanished mid-run"),
            }
        });

        // Token entries for finished jobs are swept lazily on the next
        // dispatch; cancelling a token that already drained is harmless.
        self.sweep_finished();
        Ok(())
    }

    /// Cancel an in-flight job.
    ///
    /// Idempotent: repeated calls, or a cancel that races natural
    /// completion, return the job's actual terminal status without faulting.
    pub fn cancel(&self, id: JobId) -> Result<JobStatus, JobError> {
        // Store resolves the race: if every chunk already completed, the job
        // is `completed` and stays that way.
        let status = self.store.cancel_job(id)?;
        if status == JobStatus::Cancelled {
            if let Some(token) = self.token_for(id) {
                token.cancel();
            }
        }
        Ok(status)
    }

    fn token_for(&self, id: JobId) -> Option<CancellationToken> {
        match self.active.read() {
            Ok(active) => active.get(&id).cloned(),
            Err(e) => {
                tracing::error!("active map lock poisoned: {e}");
                None
            }
        }
    }

    /// Drop tokens for jobs that have reached a terminal state.
    fn sweep_finished(&self) {
        let Ok(mut active) = self.active.write() else {
            return;
        };
        let store = &self.store;
        active.retain(|id, _| match store.get(*id) {
            Ok(job) => !job.is_terminal(),
            Err(_) => false,
        });
    }
}

/// Process one chunk's row range sequentially, from `start` to `end - 1`.
#[allow(clippy::too_many_arguments)]
async fn run_chunk(
    store: Arc<JobStore>,
    processor: Arc<dyn RowProcessor>,
    token: CancellationToken,
    row_timeout: Duration,
    job_id: JobId,
    chunk_id: usize,
    rows: Arc<Vec<RowRecord>>,
    range: RowRange,
) {
    // A cancel can land between the dispatch state flip and the token
    // registration; such a job is already terminal, so re-check the store
    // before touching the first row.
    match store.get(job_id) {
        Ok(job) if job.is_terminal() => {
            tracing::debug!(job_id = %job_id, chunk_id, "job already terminal, worker exiting");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(job_id = %job_id, chunk_id, error = %e, "job missing at worker start");
            return;
        }
    }

    for row_index in range.start..range.end {
        // Cooperative cancellation: stop between rows, never mid-row.
        if token.is_cancelled() {
            tracing::debug!(job_id = %job_id, chunk_id, row_index, "worker stopping on cancel");
            return;
        }

        let row = &rows[row_index];
        let outcome = match tokio::time::timeout(row_timeout, processor.process_row(row)).await {
            Ok(Ok(output)) => RowOutcome::Ok(output),
            Ok(Err(e)) => {
                // Row-level failure: absorbed locally, worker continues.
                tracing::warn!(job_id = %job_id, chunk_id, row_index, error = %e, "row failed");
                RowOutcome::Failed {
                    error: e.to_string(),
                }
            }
            Err(_) => {
                // Chunk-fatal: a silently stuck row would stall the job
                // forever, so escalate to job-level failure and stop the
                // sibling workers.
                let message = format!(
                    "row {row_index} made no progress for {}s (chunk {chunk_id})",
                    row_timeout.as_secs()
                );
                if let Err(e) = store.fail_job(job_id, message) {
                    tracing::error!(job_id = %job_id, error = %e, "failed to mark job failed");
                }
                token.cancel();
                return;
            }
        };

        if let Err(e) = store.record_row(job_id, chunk_id, row_index, outcome) {
            tracing::error!(job_id = %job_id, chunk_id, row_index, error = %e, "row update rejected");
            return;
        }
    }
    tracing::debug!(job_id = %job_id, chunk_id, "chunk range exhausted");
}
