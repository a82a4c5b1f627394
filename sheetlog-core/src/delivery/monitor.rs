//! Connection health tracking
//!
//! The monitor owns the connection state and the retry streak. It does no
//! I/O itself: the delivery client reports probe and batch outcomes here and
//! sleeps for whatever delay comes back.

use std::fmt;

use tokio::time::Instant;

use super::retry::{RetryDecision, RetrySchedule, RetryState};
use super::status::ConnectionStatus;

/// Reachability of the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    retry: RetryState,
    schedule: RetrySchedule,
}

impl ConnectionMonitor {
    pub fn new(schedule: RetrySchedule) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry: RetryState::default(),
            schedule,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.retry_count
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    /// A probe succeeded: connected, streak cleared.
    ///
    /// Returns true when this is a transition from disconnected.
    pub fn record_reachable(&mut self) -> bool {
        let was_connected = self.is_connected();
        self.state = ConnectionState::Connected;
        self.retry.reset();
        !was_connected
    }

    /// A probe failed: disconnected, streak extended.
    pub fn record_unreachable(&mut self, now: Instant) -> RetryDecision {
        self.state = ConnectionState::Disconnected;
        self.retry.record_failure(now, &self.schedule)
    }

    /// A batch failed to deliver. The retry streak is left alone; the
    /// follow-up probe decides whether a streak starts.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    pub fn status(&self, now: Instant) -> ConnectionStatus {
        match self.state {
            ConnectionState::Connected => ConnectionStatus::connected(),
            ConnectionState::Disconnected => ConnectionStatus {
                state: ConnectionState::Disconnected,
                retry_count: self.retry.retry_count,
                tier: self.retry.current_tier(now, &self.schedule),
            },
        }
    }
}
