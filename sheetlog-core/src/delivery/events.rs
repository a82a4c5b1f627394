//! Event records and the collector wire format
//!
//! Every interaction becomes an [`Event`]: a type tag, the wall-clock capture
//! time in milliseconds since the epoch, and a JSON payload whose shape
//! depends on the tag. Events are stamped once and never mutated.
//!
//! ## Wire format
//!
//! ```text
//! probe: {"event_type": "connection_check", "timestamp": <ms>, "data": {"status": "checking"}}
//! batch: {"event_type": "batch", "timestamp": <ms>, "events": [Event, ...]}
//! ```

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{RangeDims, RangeSnapshot, SheetInfo, WorkbookInfo};

/// Event type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ConnectionCheck,
    Batch,
    SelectionChanged,
    DocumentSelectionChanged,
    SheetActivated,
    SheetDeactivated,
    WorkbookSaved,
    WorkbookInfo,
    CellEdit,
    CellContent,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ConnectionCheck => "connection_check",
            EventType::Batch => "batch",
            EventType::SelectionChanged => "selection_changed",
            EventType::DocumentSelectionChanged => "document_selection_changed",
            EventType::SheetActivated => "sheet_activated",
            EventType::SheetDeactivated => "sheet_deactivated",
            EventType::WorkbookSaved => "workbook_saved",
            EventType::WorkbookInfo => "workbook_info",
            EventType::CellEdit => "cell_edit",
            EventType::CellContent => "cell_content",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured interaction waiting for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,

    /// Capture time, milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Type-specific payload
    pub data: Value,
}

impl Event {
    /// Stamp a new event with the current wall-clock time
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self::at(event_type, now_millis(), data)
    }

    pub fn at(event_type: EventType, timestamp: i64, data: Value) -> Self {
        Self {
            event_type,
            timestamp,
            data,
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Body of a reachability probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRequest {
    pub event_type: EventType,
    pub timestamp: i64,
    pub data: ProbeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeData {
    pub status: &'static str,
}

impl ProbeRequest {
    pub fn new(timestamp: i64) -> Self {
        Self {
            event_type: EventType::ConnectionCheck,
            timestamp,
            data: ProbeData { status: "checking" },
        }
    }
}

/// Body of a batch delivery; borrows the events so a failed batch can be
/// put back on the queue untouched.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest<'a> {
    pub event_type: EventType,
    pub timestamp: i64,
    pub events: &'a [Event],
}

impl<'a> BatchRequest<'a> {
    pub fn new(timestamp: i64, events: &'a [Event]) -> Self {
        Self {
            event_type: EventType::Batch,
            timestamp,
            events,
        }
    }
}

/// Anything the client POSTs to the collector
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload<'a> {
    Probe(ProbeRequest),
    Batch(BatchRequest<'a>),
}

impl Payload<'_> {
    pub fn event_type(&self) -> EventType {
        match self {
            Payload::Probe(probe) => probe.event_type,
            Payload::Batch(batch) => batch.event_type,
        }
    }
}

/// Build data payload for selection_changed events
pub fn selection_changed_data(range: &RangeSnapshot) -> Value {
    json!({
        "address": range.address,
        "columns": range.column_count,
        "rows": range.row_count,
        "cellCount": range.cell_count(),
    })
}

/// Build data payload for document_selection_changed events
pub fn document_selection_data(selection: &RangeDims) -> Value {
    dims_data(selection)
}

/// Build data payload for sheet_activated events
pub fn sheet_activated_data(sheet: &SheetInfo) -> Value {
    sheet_data(sheet)
}

/// Build data payload for sheet_deactivated events
pub fn sheet_deactivated_data(sheet_id: &str) -> Value {
    json!({ "worksheetId": sheet_id })
}

/// Build data payload for workbook_saved events
pub fn workbook_saved_data() -> Value {
    json!({})
}

/// Build data payload for workbook_info events
pub fn workbook_info_data(info: &WorkbookInfo) -> Value {
    let worksheets: Vec<Value> = info
        .worksheets
        .iter()
        .map(|sheet| {
            json!({
                "name": sheet.name,
                "position": sheet.position,
                "visibility": sheet.visibility.as_str(),
            })
        })
        .collect();

    json!({
        "name": info.name,
        "worksheets": worksheets,
        "activeSheet": sheet_data(&info.active_sheet),
        "selection": dims_data(&info.selection),
    })
}

fn sheet_data(sheet: &SheetInfo) -> Value {
    json!({
        "name": sheet.name,
        "id": sheet.id,
        "position": sheet.position,
    })
}

fn dims_data(dims: &RangeDims) -> Value {
    json!({
        "address": dims.address,
        "columns": dims.columns,
        "rows": dims.rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SheetVisibility, WorksheetSummary};

    fn sheet() -> SheetInfo {
        SheetInfo {
            id: "{00000000-0001-0000-0000-000000000000}".to_string(),
            name: "Budget".to_string(),
            position: 0,
        }
    }

    #[test]
    fn test_probe_wire_shape() {
        let body = serde_json::to_value(Payload::Probe(ProbeRequest::new(1_700_000_000_000))).unwrap();
        assert_eq!(
            body,
            json!({
                "event_type": "connection_check",
                "timestamp": 1_700_000_000_000i64,
                "data": {"status": "checking"},
            })
        );
    }

    #[test]
    fn test_batch_wire_shape() {
        let events = vec![
            Event::at(EventType::WorkbookSaved, 10, workbook_saved_data()),
            Event::at(EventType::SheetDeactivated, 11, sheet_deactivated_data("{7}")),
        ];
        let payload = Payload::Batch(BatchRequest::new(12, &events));
        assert_eq!(payload.event_type(), EventType::Batch);

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["event_type"], "batch");
        assert_eq!(body["timestamp"], 12);
        assert_eq!(body["events"][0]["event_type"], "workbook_saved");
        assert_eq!(body["events"][1]["data"]["worksheetId"], "{7}");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_event_type_tags() {
        assert_eq!(EventType::DocumentSelectionChanged.as_str(), "document_selection_changed");
        assert_eq!(
            serde_json::to_value(EventType::CellContent).unwrap(),
            json!("cell_content")
        );
        let parsed: EventType = serde_json::from_value(json!("workbook_info")).unwrap();
        assert_eq!(parsed, EventType::WorkbookInfo);
    }

    #[test]
    fn test_selection_changed_data() {
        let range = RangeSnapshot {
            address: "Budget!B2:D5".to_string(),
            row_count: 4,
            column_count: 3,
            values: vec![],
            formulas: vec![],
            number_format: vec![],
        };
        let data = selection_changed_data(&range);
        assert_eq!(data["address"], "Budget!B2:D5");
        assert_eq!(data["rows"], 4);
        assert_eq!(data["columns"], 3);
        assert_eq!(data["cellCount"], 12);
    }

    #[test]
    fn test_workbook_info_data() {
        let info = WorkbookInfo {
            name: "Q3.xlsx".to_string(),
            worksheets: vec![
                WorksheetSummary {
                    name: "Budget".to_string(),
                    position: 0,
                    visibility: SheetVisibility::Visible,
                },
                WorksheetSummary {
                    name: "Lookups".to_string(),
                    position: 1,
                    visibility: SheetVisibility::VeryHidden,
                },
            ],
            active_sheet: sheet(),
            selection: RangeDims {
                address: "Budget!A1".to_string(),
                rows: 1,
                columns: 1,
            },
        };

        let data = workbook_info_data(&info);
        assert_eq!(data["name"], "Q3.xlsx");
        assert_eq!(data["worksheets"][1]["visibility"], "VeryHidden");
        assert_eq!(data["activeSheet"]["name"], "Budget");
        assert_eq!(data["selection"]["address"], "Budget!A1");
        assert_eq!(data["selection"]["rows"], 1);
    }

    #[test]
    fn test_sheet_activated_data() {
        let data = sheet_activated_data(&sheet());
        assert_eq!(data["name"], "Budget");
        assert_eq!(data["position"], 0);
        assert!(data["id"].as_str().unwrap().starts_with('{'));
    }
}
