//! Rate limit for content captures.

use std::time::Duration;

use tokio::time::Instant;

/// Accepts at most one capture per window
#[derive(Debug)]
pub struct CaptureThrottle {
    window: Duration,
    last_capture: Option<Instant>,
}

impl CaptureThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_capture: None,
        }
    }

    /// Returns true and records `now` if a capture may run.
    ///
    /// A request less than one window after the last accepted capture is
    /// rejected without touching any state.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_capture {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_capture = Some(now);
        true
    }
}
