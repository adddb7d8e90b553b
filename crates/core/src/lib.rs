// crates/core/src/lib.rs
//! Rowforge core — the job orchestration model.
//!
//! An uploaded spreadsheet becomes a set of independently processed
//! row-chunks; chunk progress is aggregated into an overall job state that
//! polling clients observe through the server's read API. This crate holds
//! the domain model and pure logic:
//!
//! - [`job`] — Job/Chunk entities and their state machine
//! - [`partition`] — deterministic row-range partitioning
//! - [`store`] — in-memory job store with synchronous progress aggregation
//! - [`processor`] — the external "process one row" collaborator seam
//! - [`sheet`] — resolving a file reference into data rows
//!
//! The worker pool and HTTP surface live in `rowforge-server`.

pub mod error;
pub mod job;
pub mod partition;
pub mod processor;
pub mod sheet;
pub mod store;
pub mod types;

pub use error::{JobError, RowError, SheetError};
pub use job::{Chunk, Job, JobSummary};
pub use partition::{partition, RowRange};
pub use processor::RowProcessor;
pub use sheet::{CsvSheetSource, SheetSource};
pub use store::{JobStore, ResultRow, MAX_PARALLEL, MIN_PARALLEL};
pub use types::{
    column_index, ChunkStatus, ColumnMapping, JobId, JobStatus, RowOutcome, RowOutput, RowRecord,
};
