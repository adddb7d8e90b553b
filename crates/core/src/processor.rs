// crates/core/src/processor.rs
//! The external "process one row" collaborator seam.

use async_trait::async_trait;

use crate::error::RowError;
use crate::types::{RowOutput, RowRecord};

/// Transforms a single spreadsheet row: product-name rewriting plus
/// keyword/category lookup.
///
/// The orchestrator treats this as a black box — it only observes
/// success/failure per row. Implementations include:
/// - `LlmRowProcessor` (server) — calls an OpenAI-compatible chat endpoint
/// - test doubles with scripted outcomes and delays
#[async_trait]
pub trait RowProcessor: Send + Sync {
    /// Process one row. A returned error is a row-level failure: the worker
    /// records it and continues with the next row.
    async fn process_row(&self, row: &RowRecord) -> Result<RowOutput, RowError>;

    /// Provider name for logging/display (e.g. "openai-compatible").
    fn name(&self) -> &str;
}
