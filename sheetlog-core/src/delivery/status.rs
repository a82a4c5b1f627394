//! Status reporting toward the host UI
//!
//! The UI gets two things: the connection status on every probe outcome, and
//! a short rolling log of significant activity (connects, disconnects,
//! start/stop, errors). Per-event detail stays in the tracing output.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};

use super::monitor::ConnectionState;
use super::retry::RetryTier;

/// Connection status as rendered by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub tier: Option<RetryTier>,
}

impl ConnectionStatus {
    pub fn connected() -> Self {
        Self {
            state: ConnectionState::Connected,
            retry_count: 0,
            tier: None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.state, self.tier) {
            (ConnectionState::Connected, _) => f.write_str("Connected"),
            (ConnectionState::Disconnected, Some(tier)) if self.retry_count > 0 => write!(
                f,
                "Disconnected (Retry #{}, Tier {})",
                self.retry_count, tier
            ),
            (ConnectionState::Disconnected, _) => f.write_str("Disconnected"),
        }
    }
}

/// One line of the rolling activity log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Bounded log keeping the most recent entries
#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Append an entry, evicting the oldest past capacity.
    pub fn push(&mut self, message: impl Into<String>) -> ActivityEntry {
        let entry = ActivityEntry {
            at: Utc::now(),
            message: message.into(),
        };
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        entry
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Receiver for status updates, implemented by the host UI
///
/// Called outside any client borrow, so implementations may query the client.
pub trait StatusSink {
    fn status_changed(&self, status: &ConnectionStatus);

    fn activity(&self, _entry: &ActivityEntry) {}
}

/// Sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn status_changed(&self, _status: &ConnectionStatus) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::connected().to_string(), "Connected");

        let retrying = ConnectionStatus {
            state: ConnectionState::Disconnected,
            retry_count: 4,
            tier: Some(RetryTier::Moderate),
        };
        assert_eq!(retrying.to_string(), "Disconnected (Retry #4, Tier 2)");

        let dropped = ConnectionStatus {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            tier: None,
        };
        assert_eq!(dropped.to_string(), "Disconnected");
    }

    #[test]
    fn test_activity_log_is_bounded() {
        let mut log = ActivityLog::new(5);
        for i in 0..8 {
            log.push(format!("entry {}", i));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].message, "entry 3");
        assert_eq!(entries[4].message, "entry 7");
    }

    #[test]
    fn test_activity_entry_display() {
        let mut log = ActivityLog::new(1);
        let entry = log.push("Started logging");
        let rendered = entry.to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] Started logging"));
    }
}
