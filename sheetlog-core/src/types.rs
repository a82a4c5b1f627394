//! Domain types describing spreadsheet state as the host reports it.
//!
//! Cell contents are kept as raw JSON values: the host hands out numbers,
//! strings, booleans and empty cells, and the collector wants them verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row-major matrix of cell values, formulas or number formats.
pub type CellMatrix = Vec<Vec<Value>>;

/// A loaded range: its address, dimensions and cell contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSnapshot {
    /// Fully qualified address, e.g. `Sheet1!A1:B2`
    pub address: String,
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub values: CellMatrix,
    #[serde(default)]
    pub formulas: CellMatrix,
    #[serde(default)]
    pub number_format: CellMatrix,
}

impl RangeSnapshot {
    /// Total number of cells the host reports for this range.
    pub fn cell_count(&self) -> usize {
        self.row_count.saturating_mul(self.column_count)
    }
}

/// Address and dimensions of a range without its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDims {
    pub address: String,
    pub rows: usize,
    pub columns: usize,
}

/// Identity of a worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub id: String,
    pub name: String,
    pub position: u32,
}

/// Worksheet visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetVisibility {
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetVisibility::Visible => "Visible",
            SheetVisibility::Hidden => "Hidden",
            SheetVisibility::VeryHidden => "VeryHidden",
        }
    }
}

/// One entry of the workbook's worksheet list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetSummary {
    pub name: String,
    pub position: u32,
    pub visibility: SheetVisibility,
}

/// Workbook overview captured when logging starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookInfo {
    pub name: String,
    pub worksheets: Vec<WorksheetSummary>,
    pub active_sheet: SheetInfo,
    pub selection: RangeDims,
}
