//! Replayed spreadsheet host
//!
//! Stands in for the spreadsheet application: stdin lines either raise a
//! notification or replace the state the host answers reads with.
//!
//! ```text
//! {"kind":"set_selection","range":{"address":"Sheet1!A1","rowCount":1,"columnCount":1,"values":[[1]]}}
//! {"kind":"selection_changed","range":{"address":"Sheet1!A1","rowCount":1,"columnCount":1}}
//! {"kind":"document_saved"}
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::Deserialize;
use sheetlog_core::{
    Error, Host, HostNotification, NotificationSource, RangeSnapshot, Result, WorkbookInfo,
};

/// One line of replay input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReplayLine {
    Notification(HostNotification),
    State(StateUpdate),
}

/// Host state changes that raise no notification
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateUpdate {
    /// Replace the selected range, e.g. to simulate an in-place edit
    SetSelection { range: RangeSnapshot },
    SetWorkbook { workbook: WorkbookInfo },
}

#[derive(Default)]
struct ReplayState {
    selection: Option<RangeSnapshot>,
    workbook: Option<WorkbookInfo>,
    subscribed: HashSet<NotificationSource>,
}

#[derive(Clone, Default)]
pub struct ReplayHost {
    state: Rc<RefCell<ReplayState>>,
}

impl ReplayHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update host state for `notification` and report whether the client
    /// registered for it.
    pub fn accept(&self, notification: &HostNotification) -> bool {
        let mut state = self.state.borrow_mut();
        if let HostNotification::SelectionChanged { range } = notification {
            state.selection = Some(range.clone());
        }

        let source = notification.source();
        let registered = state.subscribed.contains(&source);
        if !registered {
            tracing::debug!(source = %source, "Dropping notification, source not registered");
        }
        registered
    }

    pub fn apply(&self, update: StateUpdate) {
        let mut state = self.state.borrow_mut();
        match update {
            StateUpdate::SetSelection { range } => {
                tracing::debug!(address = %range.address, "Selection replaced");
                state.selection = Some(range);
            }
            StateUpdate::SetWorkbook { workbook } => {
                tracing::debug!(name = %workbook.name, "Workbook replaced");
                state.workbook = Some(workbook);
            }
        }
    }
}

impl Host for ReplayHost {
    async fn selected_range(&self) -> Result<RangeSnapshot> {
        self.state
            .borrow()
            .selection
            .clone()
            .ok_or_else(|| Error::Host("no selection loaded".to_string()))
    }

    async fn workbook_info(&self) -> Result<WorkbookInfo> {
        self.state
            .borrow()
            .workbook
            .clone()
            .ok_or_else(|| Error::Host("no workbook loaded".to_string()))
    }

    fn subscribe(&self, source: NotificationSource) -> Result<()> {
        self.state.borrow_mut().subscribed.insert(source);
        Ok(())
    }

    fn unsubscribe(&self, source: NotificationSource) -> Result<()> {
        self.state.borrow_mut().subscribed.remove(&source);
        Ok(())
    }
}
