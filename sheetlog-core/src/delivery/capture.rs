//! Content capture payloads
//!
//! Small ranges are captured in full. Anything above the cell limit is
//! reduced to its dimensions plus a top-left sample, which caps the size of a
//! single event no matter how large the selection is.

use serde_json::{json, Value};

use crate::config::DeliveryConfig;
use crate::types::{CellMatrix, RangeSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Ranges with more cells than this are sampled
    pub cell_limit: usize,
    /// Rows and columns kept in a sample
    pub sample_size: usize,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            cell_limit: 100,
            sample_size: 3,
        }
    }
}

impl CapturePolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            cell_limit: config.large_range_cell_limit,
            sample_size: config.sample_size,
        }
    }

    pub fn is_large(&self, range: &RangeSnapshot) -> bool {
        range.cell_count() > self.cell_limit
    }

    /// Build the cell_content payload for `range`.
    pub fn content_payload(&self, range: &RangeSnapshot) -> Value {
        if self.is_large(range) {
            json!({
                "address": range.address,
                "rowCount": range.row_count,
                "columnCount": range.column_count,
                "is_large_range": true,
                "sample_values": sample(&range.values, self.sample_size),
                "sample_formulas": sample(&range.formulas, self.sample_size),
            })
        } else {
            json!({
                "address": range.address,
                "rowCount": range.row_count,
                "columnCount": range.column_count,
                "values": range.values,
                "formulas": range.formulas,
                "numberFormat": range.number_format,
            })
        }
    }
}

fn sample(matrix: &CellMatrix, size: usize) -> CellMatrix {
    matrix
        .iter()
        .take(size)
        .map(|row| row.iter().take(size).cloned().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, columns: usize) -> RangeSnapshot {
        let values: CellMatrix = (0..rows)
            .map(|r| (0..columns).map(|c| json!(r * columns + c)).collect())
            .collect();
        let formulas = values.clone();
        let number_format = (0..rows)
            .map(|_| (0..columns).map(|_| json!("General")).collect())
            .collect();
        RangeSnapshot {
            address: format!("Sheet1!R1C1:R{}C{}", rows, columns),
            row_count: rows,
            column_count: columns,
            values,
            formulas,
            number_format,
        }
    }

    #[test]
    fn test_small_range_is_captured_in_full() {
        let policy = CapturePolicy::default();
        let range = grid(2, 2);
        let payload = policy.content_payload(&range);

        assert!(payload.get("is_large_range").is_none());
        assert_eq!(payload["values"], json!([[0, 1], [2, 3]]));
        assert_eq!(payload["numberFormat"][1][1], "General");
        assert_eq!(payload["rowCount"], 2);
    }

    #[test]
    fn test_limit_is_inclusive_for_full_capture() {
        let policy = CapturePolicy::default();
        let payload = policy.content_payload(&grid(10, 10));
        assert!(payload.get("is_large_range").is_none());
        assert_eq!(payload["values"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_large_range_is_sampled() {
        let policy = CapturePolicy::default();
        let range = grid(101, 1);
        let payload = policy.content_payload(&range);

        assert_eq!(payload["is_large_range"], true);
        assert!(payload.get("values").is_none());
        assert!(payload.get("numberFormat").is_none());
        assert_eq!(payload["sample_values"], json!([[0], [1], [2]]));
        assert_eq!(payload["columnCount"], 1);
    }

    #[test]
    fn test_sample_is_at_most_three_by_three() {
        let policy = CapturePolicy::default();
        let payload = policy.content_payload(&grid(20, 20));

        let rows = payload["sample_formulas"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row.as_array().unwrap().len(), 3);
        }
        assert_eq!(payload["sample_values"][2][2], json!(42));
    }

    #[test]
    fn test_policy_from_config() {
        let config = DeliveryConfig {
            large_range_cell_limit: 4,
            sample_size: 1,
            ..Default::default()
        };
        let policy = CapturePolicy::from_config(&config);
        let payload = policy.content_payload(&grid(2, 3));
        assert_eq!(payload["sample_values"], json!([[0]]));
    }
}
