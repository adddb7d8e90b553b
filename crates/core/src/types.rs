// crates/core/src/types.rs
//! Shared domain types for spreadsheet processing jobs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job.
pub type JobId = Uuid;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses permit no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a single chunk.
///
/// Chunks never independently fail — a row-level failure is recorded in the
/// result table and the chunk keeps going. Chunk-fatal conditions escalate to
/// the job level instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
}

impl ChunkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Processing => "processing",
            ChunkStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four spreadsheet columns a job reads from and writes to.
///
/// Values are spreadsheet column letters ("A", "B", ... "AA"). A job must not
/// exist with an incomplete mapping, so `validate` runs before job creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub original_product_name: String,
    pub refined_product_name: String,
    pub keyword: String,
    pub category: String,
}

impl ColumnMapping {
    /// Check that all four column references are present and well-formed.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("original_product_name", &self.original_product_name),
            ("refined_product_name", &self.refined_product_name),
            ("keyword", &self.keyword),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(format!("column_mapping.{field} must not be empty"));
            }
            if column_index(value).is_none() {
                return Err(format!(
                    "column_mapping.{field}: '{value}' is not a column letter"
                ));
            }
        }
        Ok(())
    }
}

/// Convert a spreadsheet column letter to a 0-based index ("A" → 0, "AA" → 26).
///
/// Returns `None` for anything that is not ASCII letters, or a reference too
/// long to denote a real column (overflow would otherwise wrap silently).
pub fn column_index(column: &str) -> Option<usize> {
    let column = column.trim();
    if column.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for c in column.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// One source row handed to the row processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    /// 0-based index into the sheet's data rows.
    pub index: usize,
    /// Cell value from the `original_product_name` column.
    pub original_name: String,
}

/// Output of processing one row successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutput {
    pub refined_name: String,
    /// Comma-joined curated keywords.
    pub keywords: String,
    pub category: String,
}

/// Recorded result of attempting one row.
///
/// A failed row still counts as attempted (it advances `rows_processed`);
/// its output cells are left blank and the error is kept for the result file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RowOutcome {
    Ok(RowOutput),
    Failed { error: String },
}

impl RowOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RowOutcome::Ok(_))
    }
}
