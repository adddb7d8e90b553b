// crates/core/src/partition.rs
//! Deterministic row-range partitioning.
//!
//! Splits `total_rows` data rows into near-equal contiguous chunks, one per
//! worker. The first `total_rows % parallel_count` chunks get one extra row,
//! so sizes differ by at most 1 and the ranges cover `[0, total_rows)`
//! exactly. Reproducible: the same inputs always yield the same partition.

use serde::{Deserialize, Serialize};

/// Half-open row interval `[start, end)` over a sheet's data rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `total_rows` into at most `parallel_count` contiguous ranges.
///
/// If `total_rows < parallel_count` the effective chunk count is clamped to
/// `total_rows` — an empty chunk is never produced; the surplus parallelism
/// is simply unused.
pub fn partition(total_rows: usize, parallel_count: usize) -> Vec<RowRange> {
    if total_rows == 0 || parallel_count == 0 {
        return Vec::new();
    }
    let count = parallel_count.min(total_rows);
    let base = total_rows / count;
    let remainder = total_rows % count;

    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = if i < remainder { base + 1 } else { base };
        ranges.push(RowRange {
            start,
            end: start + size,
        });
        start += size;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sizes(ranges: &[RowRange]) -> Vec<usize> {
        ranges.iter().map(|r| r.len()).collect()
    }

    #[test]
    fn test_even_split() {
        // 100 rows across 4 workers: four chunks of 25.
        let ranges = partition(100, 4);
        assert_eq!(sizes(&ranges), vec![25, 25, 25, 25]);
        assert_eq!(
            ranges,
            vec![
                RowRange { start: 0, end: 25 },
                RowRange { start: 25, end: 50 },
                RowRange { start: 50, end: 75 },
                RowRange { start: 75, end: 100 },
            ]
        );
    }

    #[test]
    fn test_remainder_goes_to_leading_chunks() {
        // 10 rows across 4 workers: remainder 2, first two chunks get base+1.
        let ranges = partition(10, 4);
        assert_eq!(sizes(&ranges), vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_fewer_rows_than_workers() {
        // No empty chunks: effective count clamps to the row count.
        let ranges = partition(3, 10);
        assert_eq!(sizes(&ranges), vec![1, 1, 1]);
    }

    #[test]
    fn test_single_worker() {
        let ranges = partition(57, 1);
        assert_eq!(ranges, vec![RowRange { start: 0, end: 57 }]);
    }

    #[test]
    fn test_zero_rows() {
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn test_partition_properties_sweep() {
        // For every total up to 500 and every allowed parallelism: ranges are
        // contiguous, disjoint, cover [0, total) exactly, sizes differ by at
        // most 1, and no chunk is empty.
        for total in 1..=500 {
            for parallel in 1..=10 {
                let ranges = partition(total, parallel);
                assert_eq!(ranges.len(), parallel.min(total));

                let mut expected_start = 0;
                for r in &ranges {
                    assert_eq!(r.start, expected_start);
                    assert!(!r.is_empty());
                    expected_start = r.end;
                }
                assert_eq!(expected_start, total);

                let min = ranges.iter().map(|r| r.len()).min().unwrap();
                let max = ranges.iter().map(|r| r.len()).max().unwrap();
                assert!(
                    max - min <= 1,
                    "sizes differ by more than 1 for total={total} parallel={parallel}"
                );
            }
        }
    }
}
