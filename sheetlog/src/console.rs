//! Status output on stdout

use std::cell::RefCell;

use sheetlog_core::delivery::{ActivityEntry, ConnectionStatus, StatusSink};

/// Prints status transitions and significant activity
#[derive(Default)]
pub struct ConsoleStatus {
    last: RefCell<Option<ConnectionStatus>>,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for ConsoleStatus {
    fn status_changed(&self, status: &ConnectionStatus) {
        let mut last = self.last.borrow_mut();
        if last.as_ref() == Some(status) {
            return;
        }
        println!("Status: {}", status);
        *last = Some(*status);
    }

    fn activity(&self, entry: &ActivityEntry) {
        println!("{}", entry);
    }
}
