// crates/core/src/sheet.rs
//! Resolving an opaque file reference into sheet rows.
//!
//! Upload handling and preview rendering are outside this subsystem; by the
//! time a job is created the client holds an opaque `file_ref` naming a file
//! that already lives in the upload directory.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SheetError;
use crate::types::{column_index, ColumnMapping, RowRecord};

/// Resolves a file reference into the job's data rows.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn load(
        &self,
        file_ref: &str,
        mapping: &ColumnMapping,
    ) -> Result<Vec<RowRecord>, SheetError>;
}

/// Sheet source reading CSV files from a local upload directory.
///
/// The first record is the header row; data rows are everything after it.
/// The `original_product_name` column letter from the job's mapping selects
/// the cell fed to the row processor.
pub struct CsvSheetSource {
    root: PathBuf,
}

impl CsvSheetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_ref: &str) -> Result<PathBuf, SheetError> {
        // file_ref is a bare name, never a path.
        if file_ref.is_empty()
            || file_ref.contains('/')
            || file_ref.contains('\\')
            || file_ref.contains("..")
        {
            return Err(SheetError::NotFound {
                path: self.root.join(file_ref),
            });
        }
        Ok(self.root.join(file_ref))
    }
}

#[async_trait]
impl SheetSource for CsvSheetSource {
    async fn load(
        &self,
        file_ref: &str,
        mapping: &ColumnMapping,
    ) -> Result<Vec<RowRecord>, SheetError> {
        let path = self.resolve(file_ref)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SheetError::NotFound { path });
            }
            Err(source) => return Err(SheetError::Io { path, source }),
        };

        let name_col =
            column_index(&mapping.original_product_name).ok_or_else(|| {
                SheetError::InvalidColumn {
                    column: mapping.original_product_name.clone(),
                }
            })?;

        let records = parse_csv(&text);
        // Record 0 is the header row.
        if records.len() <= 1 {
            return Err(SheetError::Empty { path });
        }

        let rows = records
            .into_iter()
            .skip(1)
            .enumerate()
            .map(|(index, record)| RowRecord {
                index,
                original_name: record.get(name_col).cloned().unwrap_or_default(),
            })
            .collect();
        Ok(rows)
    }
}

/// Minimal RFC 4180 reader: quoted fields, doubled-quote escapes, and
/// newlines inside quotes. Trailing empty lines are dropped.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            original_product_name: "A".to_string(),
            refined_product_name: "B".to_string(),
            keyword: "C".to_string(),
            category: "D".to_string(),
        }
    }

    fn write_sheet(dir: &tempfile::TempDir, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_load_skips_header_and_maps_column() {
        let dir = tempfile::tempdir().unwrap();
        write_sheet(
            &dir,
            "products.csv",
            "상품명,정제명,키워드,카테고리\nwireless mouse,,,\nusb hub,,,\n",
        );
        let source = CsvSheetSource::new(dir.path());

        let rows = source.load("products.csv", &mapping()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].original_name, "wireless mouse");
        assert_eq!(rows[1].original_name, "usb hub");
    }

    #[tokio::test]
    async fn test_load_with_non_first_column() {
        let dir = tempfile::tempdir().unwrap();
        write_sheet(&dir, "s.csv", "id,name\n1,first product\n2,second product\n");
        let source = CsvSheetSource::new(dir.path());

        let mut m = mapping();
        m.original_product_name = "B".to_string();
        let rows = source.load("s.csv", &m).await.unwrap();
        assert_eq!(rows[0].original_name, "first product");
        assert_eq!(rows[1].original_name, "second product");
    }

    #[tokio::test]
    async fn test_load_quoted_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_sheet(
            &dir,
            "q.csv",
            "name\n\"mouse, wireless\"\n\"says \"\"hi\"\"\"\n",
        );
        let source = CsvSheetSource::new(dir.path());

        let rows = source.load("q.csv", &mapping()).await.unwrap();
        assert_eq!(rows[0].original_name, "mouse, wireless");
        assert_eq!(rows[1].original_name, "says \"hi\"");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSheetSource::new(dir.path());
        let err = source.load("nope.csv", &mapping()).await.unwrap_err();
        assert!(matches!(err, SheetError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSheetSource::new(dir.path());
        let err = source
            .load("../etc/passwd", &mapping())
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_header_only_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_sheet(&dir, "empty.csv", "name,refined,keyword,category\n");
        let source = CsvSheetSource::new(dir.path());
        let err = source.load("empty.csv", &mapping()).await.unwrap_err();
        assert!(matches!(err, SheetError::Empty { .. }));
    }

    #[test]
    fn test_parse_csv_blank_lines_dropped() {
        let records = parse_csv("a,b\n\n1,2\n");
        assert_eq!(records, vec![vec!["a", "b"], vec!["1", "2"]]);
    }
}
