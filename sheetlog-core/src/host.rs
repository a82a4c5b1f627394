//! The host application as seen from the delivery client.
//!
//! The host pushes [`HostNotification`]s into the client and answers a small
//! set of suspending reads through the [`Host`] trait. The client never
//! reaches into host internals any other way.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{RangeDims, RangeSnapshot, SheetInfo, WorkbookInfo};

/// A notification the host raises for a user interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostNotification {
    /// The worksheet selection moved; carries the loaded range.
    SelectionChanged { range: RangeSnapshot },
    /// A worksheet became active.
    SheetActivated { sheet: SheetInfo },
    /// A worksheet stopped being active.
    SheetDeactivated { sheet_id: String },
    /// The document was saved.
    DocumentSaved,
    /// Document-level selection change (raw host event).
    RawSelectionChanged { selection: RangeDims },
}

impl HostNotification {
    /// The source that has to be registered for the host to raise this.
    pub fn source(&self) -> NotificationSource {
        match self {
            HostNotification::SelectionChanged { .. } => NotificationSource::SelectionChanged,
            HostNotification::SheetActivated { .. } => NotificationSource::SheetActivated,
            HostNotification::SheetDeactivated { .. } => NotificationSource::SheetDeactivated,
            HostNotification::DocumentSaved => NotificationSource::DocumentSaved,
            HostNotification::RawSelectionChanged { .. } => {
                NotificationSource::RawSelectionChanged
            }
        }
    }
}

/// Notification sources the client registers when logging starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSource {
    SelectionChanged,
    SheetActivated,
    SheetDeactivated,
    DocumentSaved,
    RawSelectionChanged,
}

impl NotificationSource {
    pub const ALL: [NotificationSource; 5] = [
        NotificationSource::SelectionChanged,
        NotificationSource::SheetActivated,
        NotificationSource::SheetDeactivated,
        NotificationSource::DocumentSaved,
        NotificationSource::RawSelectionChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSource::SelectionChanged => "selection_changed",
            NotificationSource::SheetActivated => "sheet_activated",
            NotificationSource::SheetDeactivated => "sheet_deactivated",
            NotificationSource::DocumentSaved => "document_saved",
            NotificationSource::RawSelectionChanged => "raw_selection_changed",
        }
    }
}

impl fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads and registrations the client needs from the host application.
///
/// Reads suspend; their continuation resumes on the same single logical
/// thread as every other client task, so implementations need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// Load the currently selected range with values, formulas and formats.
    async fn selected_range(&self) -> Result<RangeSnapshot>;

    /// Load the workbook overview.
    async fn workbook_info(&self) -> Result<WorkbookInfo>;

    /// Ask the host to start raising notifications from `source`.
    ///
    /// An error means this host version cannot provide the source; the
    /// client keeps logging without it.
    fn subscribe(&self, source: NotificationSource) -> Result<()>;

    /// Stop raising notifications from `source`.
    fn unsubscribe(&self, source: NotificationSource) -> Result<()>;
}
