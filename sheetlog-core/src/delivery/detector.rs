//! Poll-and-diff edit detection
//!
//! The host does not report in-place cell edits, so the client polls the
//! selected range and diffs it against the last snapshot seen for the same
//! address. Edits overwritten between two polls are not seen.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::types::{CellMatrix, RangeSnapshot};

/// Leading character of a formula
pub const FORMULA_MARKER: char = '=';

/// One cell whose value or formula changed between polls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellChange {
    pub row: usize,
    pub column: usize,
    pub previous_value: Value,
    pub current_value: Value,
    pub previous_formula: Value,
    pub current_formula: Value,
}

/// Payload of a cell_edit event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellEdit {
    pub address: String,
    pub changes: Vec<CellChange>,
    pub is_formula: bool,
    pub current_values: CellMatrix,
    pub current_formulas: CellMatrix,
}

impl CellEdit {
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "address": self.address,
            "changes": self.changes,
            "is_formula": self.is_formula,
            "current_values": self.current_values,
            "current_formulas": self.current_formulas,
        })
    }
}

#[derive(Debug, Clone)]
struct LastSeen {
    values: CellMatrix,
    formulas: CellMatrix,
}

/// Last-seen values and formulas per range address, one generation deep
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: HashMap<String, LastSeen>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `range` as the baseline for its address without diffing.
    pub fn seed(&mut self, range: &RangeSnapshot) {
        self.last_seen.insert(
            range.address.clone(),
            LastSeen {
                values: range.values.clone(),
                formulas: range.formulas.clone(),
            },
        );
    }

    /// Diff `range` against the snapshot for its address, then replace it.
    ///
    /// A missing snapshot or a shape mismatch yields `None` and simply
    /// re-seeds.
    pub fn observe(&mut self, range: &RangeSnapshot) -> Option<CellEdit> {
        let changes = self
            .last_seen
            .get(&range.address)
            .and_then(|previous| diff(previous, range));
        self.seed(range);

        let changes = changes.filter(|changes| !changes.is_empty())?;
        Some(CellEdit {
            address: range.address.clone(),
            changes,
            is_formula: has_formula(&range.formulas),
            current_values: range.values.clone(),
            current_formulas: range.formulas.clone(),
        })
    }

    pub fn forget_all(&mut self) {
        self.last_seen.clear();
    }

    pub fn tracked_ranges(&self) -> usize {
        self.last_seen.len()
    }
}

fn same_shape(a: &CellMatrix, b: &CellMatrix) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.len() == y.len())
}

/// Dense positional diff; `None` when the matrices cannot be compared.
fn diff(previous: &LastSeen, current: &RangeSnapshot) -> Option<Vec<CellChange>> {
    if !same_shape(&previous.values, &current.values) {
        return None;
    }
    // Formulas are compared only when both generations carry a full matrix.
    let compare_formulas = same_shape(&previous.formulas, &current.formulas)
        && same_shape(&current.formulas, &current.values);

    let mut changes = Vec::new();
    for (row, (before_row, after_row)) in previous.values.iter().zip(&current.values).enumerate() {
        for (column, (before, after)) in before_row.iter().zip(after_row).enumerate() {
            let (previous_formula, current_formula) = if compare_formulas {
                (
                    previous.formulas[row][column].clone(),
                    current.formulas[row][column].clone(),
                )
            } else {
                (Value::Null, Value::Null)
            };

            if before != after || previous_formula != current_formula {
                changes.push(CellChange {
                    row,
                    column,
                    previous_value: before.clone(),
                    current_value: after.clone(),
                    previous_formula,
                    current_formula,
                });
            }
        }
    }
    Some(changes)
}

fn has_formula(formulas: &CellMatrix) -> bool {
    formulas
        .iter()
        .flatten()
        .any(|cell| matches!(cell, Value::String(s) if s.starts_with(FORMULA_MARKER)))
}
