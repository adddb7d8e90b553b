// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use rowforge_core::{CsvSheetSource, JobStore, RowProcessor, SheetSource};

use crate::config::Config;
use crate::jobs::JobRunner;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Single source of truth for Job/Chunk state.
    pub store: Arc<JobStore>,
    /// Worker pool driving in-flight jobs.
    pub runner: Arc<JobRunner>,
    /// Resolves file references from job creation requests into rows.
    pub sheets: Arc<dyn SheetSource>,
}

impl AppState {
    /// Wire up the production state: CSV sheet source over the configured
    /// upload directory, and a runner using the given row processor.
    pub fn new(config: &Config, processor: Arc<dyn RowProcessor>) -> Arc<Self> {
        let store = Arc::new(JobStore::new());
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            processor,
            config.row_timeout,
        ));
        let sheets = Arc::new(CsvSheetSource::new(config.upload_dir.clone()));
        Self::with_parts(store, runner, sheets)
    }

    /// Assemble state from pre-built parts (tests swap in doubles here).
    pub fn with_parts(
        store: Arc<JobStore>,
        runner: Arc<JobRunner>,
        sheets: Arc<dyn SheetSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            store,
            runner,
            sheets,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
