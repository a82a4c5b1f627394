//! Event delivery to the log collector
//!
//! ## Architecture
//!
//! Capture and delivery are decoupled by an in-memory queue:
//! - Host notifications and the change detector append events to the queue
//! - A dispatch timer drains the queue into one batch per tick
//! - A failed batch goes back to the front of the queue, ahead of anything
//!   captured while it was in flight
//! - A connection monitor probes the collector on a tiered schedule while it
//!   is unreachable; dispatch is suspended until a probe succeeds
//!
//! Nothing is persisted. Events still queued when the process exits are lost.
//!
//! ## Usage
//!
//! ```toml
//! [delivery]
//! endpoint_url = "https://localhost:5555/log"
//! batch_interval_ms = 1000
//! ```

mod capture;
mod client;
mod detector;
mod events;
mod monitor;
mod queue;
mod retry;
mod status;
mod throttle;
mod transport;

pub use capture::CapturePolicy;
pub use client::{DeliveryClient, DeliveryStats, DispatchOutcome, ProbeOutcome};
pub use detector::{CellChange, CellEdit, ChangeDetector, FORMULA_MARKER};
pub use events::{now_millis, BatchRequest, Event, EventType, Payload, ProbeRequest};
pub use monitor::{ConnectionMonitor, ConnectionState};
pub use queue::EventQueue;
pub use retry::{RetryDecision, RetrySchedule, RetryState, RetryTier};
pub use status::{ActivityEntry, ActivityLog, ConnectionStatus, NullStatusSink, StatusSink};
pub use throttle::CaptureThrottle;
pub use transport::{HttpTransport, Transport};
