//! Delivery client: owns the queue, the connection monitor and every timer.
//!
//! All work runs as short tasks on one `tokio::task::LocalSet`. State lives
//! in a `RefCell` that is only borrowed between suspension points, never
//! across one, so every continuation reads the latest state when it resumes.
//!
//! ## Lifecycle
//!
//! - [`DeliveryClient::start`] spawns the connection monitor, which probes
//!   immediately and keeps probing on the tiered schedule until connected.
//! - A successful probe starts logging: the dispatch and change-detector
//!   timers start, the active selection is captured and `workbook_info`
//!   is queued.
//! - [`DeliveryClient::shutdown`] stops the monitor, cancels both timers and
//!   flushes whatever is still queued with one last dispatch.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::DeliveryConfig;
use crate::error::{Error, Result};
use crate::host::{Host, HostNotification, NotificationSource};
use crate::types::RangeSnapshot;

use super::capture::CapturePolicy;
use super::detector::ChangeDetector;
use super::events::{self, now_millis, BatchRequest, Event, EventType, Payload, ProbeRequest};
use super::monitor::{ConnectionMonitor, ConnectionState};
use super::queue::EventQueue;
use super::retry::{RetryDecision, RetrySchedule};
use super::status::{ActivityEntry, ActivityLog, ConnectionStatus, NullStatusSink, StatusSink};
use super::throttle::CaptureThrottle;
use super::transport::Transport;

/// Result of one reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    /// The next probe is due after `decision.delay`
    Unreachable(RetryDecision),
}

/// Result of one dispatch tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was queued; no request was made
    Idle,
    /// The batch of this many events was accepted
    Delivered(usize),
    /// The batch of this many events failed and is back at the queue front
    Requeued(usize),
}

/// Delivery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Probes the collector answered with success
    pub probes_succeeded: usize,
    /// Probes that failed for any reason
    pub probes_failed: usize,
    /// Batches accepted by the collector
    pub batches_sent: usize,
    /// Events inside accepted batches
    pub events_sent: usize,
    /// Batch attempts that were re-queued
    pub batches_failed: usize,
}

/// Handle to a delivery client
///
/// Cloning is cheap and every clone drives the same client. Must be used from
/// inside a `tokio::task::LocalSet`.
pub struct DeliveryClient<T, H> {
    inner: Rc<Inner<T, H>>,
}

impl<T, H> Clone for DeliveryClient<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

struct Inner<T, H> {
    config: DeliveryConfig,
    capture_policy: CapturePolicy,
    transport: T,
    host: H,
    sink: Box<dyn StatusSink>,
    /// Wakes the monitor for an immediate probe
    reprobe: Notify,
    state: RefCell<State>,
}

struct State {
    monitor: ConnectionMonitor,
    logging: bool,
    queue: EventQueue,
    throttle: CaptureThrottle,
    detector: ChangeDetector,
    activity: ActivityLog,
    stats: DeliveryStats,
    subscribed: Vec<NotificationSource>,
    /// Set while consecutive detector reads keep failing
    host_read_failing: bool,
    timers: Option<LoggingTimers>,
    monitor_task: Option<JoinHandle<()>>,
}

/// Dispatch and detector timers started by `start_logging`
struct LoggingTimers {
    cancel: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl<T, H> DeliveryClient<T, H>
where
    T: Transport + 'static,
    H: Host + 'static,
{
    /// Create a client that reports status nowhere
    pub fn new(config: DeliveryConfig, transport: T, host: H) -> Result<Self> {
        Self::with_status_sink(config, transport, host, NullStatusSink)
    }

    /// Create a client reporting to `sink`.
    ///
    /// Fails with [`Error::Config`] when the configuration is invalid, e.g. a
    /// zero batch or poll interval.
    pub fn with_status_sink(
        config: DeliveryConfig,
        transport: T,
        host: H,
        sink: impl StatusSink + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let state = State {
            monitor: ConnectionMonitor::new(RetrySchedule::new(&config.retry)),
            logging: false,
            queue: EventQueue::new(),
            throttle: CaptureThrottle::new(config.throttle_window()),
            detector: ChangeDetector::new(),
            activity: ActivityLog::new(config.status_log_capacity),
            stats: DeliveryStats::default(),
            subscribed: Vec::new(),
            host_read_failing: false,
            timers: None,
            monitor_task: None,
        };

        Ok(Self {
            inner: Rc::new(Inner {
                capture_policy: CapturePolicy::from_config(&config),
                config,
                transport,
                host,
                sink: Box::new(sink),
                reprobe: Notify::new(),
                state: RefCell::new(state),
            }),
        })
    }

    fn state(&self) -> RefMut<'_, State> {
        self.inner.state.borrow_mut()
    }

    /// Start the connection monitor. Calling it again is a no-op.
    pub fn start(&self) {
        if self.state().monitor_task.is_some() {
            return;
        }
        let handle = tokio::task::spawn_local(self.clone().run_monitor());
        self.state().monitor_task = Some(handle);

        tracing::info!(endpoint = %self.inner.config.endpoint_url, "Delivery client started");
        self.announce("Delivery client initialized");
    }

    /// Stop monitoring and logging, flushing anything still queued.
    pub async fn shutdown(&self) {
        let monitor = self.state().monitor_task.take();
        if let Some(handle) = monitor {
            handle.abort();
        }
        self.stop_logging().await;
        tracing::info!(pending = self.pending_count(), "Delivery client shut down");
    }

    /// Probe forever: wait for a re-probe request while connected, otherwise
    /// sleep the tier delay (or less, if a re-probe is requested).
    async fn run_monitor(self) {
        loop {
            match self.probe().await {
                ProbeOutcome::Reachable => self.inner.reprobe.notified().await,
                ProbeOutcome::Unreachable(decision) => {
                    tokio::select! {
                        _ = time::sleep(decision.delay) => {}
                        _ = self.inner.reprobe.notified() => {
                            tracing::debug!("Re-probe requested during retry wait");
                        }
                    }
                }
            }
        }
    }

    /// Perform one reachability check and apply the outcome.
    pub async fn probe(&self) -> ProbeOutcome {
        let payload = Payload::Probe(ProbeRequest::new(now_millis()));
        let result = self.send(&payload).await;

        match result {
            Ok(()) => {
                let (status, reconnected) = {
                    let mut state = self.state();
                    state.stats.probes_succeeded += 1;
                    let reconnected = state.monitor.record_reachable();
                    (state.monitor.status(Instant::now()), reconnected)
                };
                tracing::info!("Collector reachable");
                self.inner.sink.status_changed(&status);
                if reconnected {
                    self.announce("Connected to collector");
                }
                self.start_logging();
                ProbeOutcome::Reachable
            }
            Err(e) => {
                let now = Instant::now();
                let (status, decision, was_connected) = {
                    let mut state = self.state();
                    state.stats.probes_failed += 1;
                    let was_connected = state.monitor.is_connected();
                    let decision = state.monitor.record_unreachable(now);
                    (state.monitor.status(now), decision, was_connected)
                };
                tracing::debug!(
                    error = %e,
                    attempt = decision.attempt,
                    tier = decision.tier.number(),
                    delay_ms = decision.delay.as_millis() as u64,
                    "Connectivity probe failed"
                );
                self.inner.sink.status_changed(&status);
                if was_connected {
                    self.announce("Disconnected from collector");
                }
                self.announce(format!(
                    "Connection attempt #{} failed. Tier {}: Retrying in {:?}...",
                    decision.attempt, decision.tier, decision.delay
                ));
                ProbeOutcome::Unreachable(decision)
            }
        }
    }

    /// Start logging if connected. Starting while already logging is a no-op.
    pub fn start_logging(&self) {
        let (connected, logging) = {
            let state = self.state();
            (state.monitor.is_connected(), state.logging)
        };
        if !connected {
            self.announce("Cannot start logging: not connected to collector");
            return;
        }
        if logging {
            return;
        }

        self.state().logging = true;
        self.announce("Started logging");
        self.register_sources();

        let (cancel, _) = watch::channel(false);
        let dispatch = tokio::task::spawn_local(self.clone().run_dispatch_loop(cancel.subscribe()));
        let detector = tokio::task::spawn_local(self.clone().run_detector_loop(cancel.subscribe()));
        self.state().timers = Some(LoggingTimers {
            cancel,
            handles: vec![dispatch, detector],
        });

        let client = self.clone();
        tokio::task::spawn_local(async move {
            client.capture_active_selection().await;
            client.log_workbook_info().await;
        });
    }

    /// Stop logging: cancel both timers, then flush the queue once.
    pub async fn stop_logging(&self) {
        let timers = {
            let mut state = self.state();
            if !state.logging {
                return;
            }
            state.logging = false;
            state.detector.forget_all();
            state.timers.take()
        };

        self.announce("Stopped logging");
        self.unregister_sources();

        if let Some(timers) = timers {
            timers.cancel.send_replace(true);
            for handle in timers.handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Logging timer ended abnormally");
                }
            }
        }

        if self.pending_count() > 0 {
            self.dispatch_tick().await;
        }
    }

    fn register_sources(&self) {
        for source in NotificationSource::ALL {
            match self.inner.host.subscribe(source) {
                Ok(()) => self.state().subscribed.push(source),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Notification source unavailable, continuing without it");
                    self.announce(format!("Error: {}", e));
                }
            }
        }
    }

    fn unregister_sources(&self) {
        let sources = std::mem::take(&mut self.state().subscribed);
        for source in sources {
            if let Err(e) = self.inner.host.unsubscribe(source) {
                tracing::warn!(source = %source, error = %e, "Failed to unregister notification source");
            }
        }
    }

    async fn run_dispatch_loop(self, mut cancel: watch::Receiver<bool>) {
        let period = self.inner.config.batch_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.changed() => break,
                _ = ticker.tick() => {}
            }
            // Delivery is suspended until the monitor reconnects.
            if self.connection_state() == ConnectionState::Connected {
                self.dispatch_tick().await;
            }
        }
        tracing::debug!("Dispatch timer stopped");
    }

    async fn run_detector_loop(self, mut cancel: watch::Receiver<bool>) {
        let period = self.inner.config.poll_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.changed() => break,
                _ = ticker.tick() => {}
            }
            self.poll_changes().await;
        }
        tracing::debug!("Change detector stopped");
    }

    /// Send everything queued as one batch.
    ///
    /// On failure the batch goes back in front of the queue, the connection
    /// is marked disconnected and the monitor is asked to probe right away.
    pub async fn dispatch_tick(&self) -> DispatchOutcome {
        let batch = self.state().queue.take_all();
        if batch.is_empty() {
            return DispatchOutcome::Idle;
        }
        let count = batch.len();

        let result = {
            let payload = Payload::Batch(BatchRequest::new(now_millis(), &batch));
            self.send(&payload).await
        };

        match result {
            Ok(()) => {
                {
                    let mut state = self.state();
                    state.stats.batches_sent += 1;
                    state.stats.events_sent += count;
                }
                tracing::info!(count, "Sent batch");
                DispatchOutcome::Delivered(count)
            }
            Err(e) => {
                let (status, was_connected) = {
                    let mut state = self.state();
                    state.queue.restore_front(batch);
                    state.stats.batches_failed += 1;
                    let was_connected = state.monitor.is_connected();
                    state.monitor.mark_disconnected();
                    (state.monitor.status(Instant::now()), was_connected)
                };
                tracing::warn!(count, error = %e, "Failed to send batch, events re-queued");
                self.inner.sink.status_changed(&status);
                self.announce(format!("Failed to send batch: {}", e));
                if was_connected {
                    self.announce("Disconnected from collector");
                }
                self.inner.reprobe.notify_one();
                DispatchOutcome::Requeued(count)
            }
        }
    }

    /// Send through the transport, classifying a missed deadline as unreachable.
    async fn send(&self, payload: &Payload<'_>) -> Result<()> {
        let timeout = self.inner.config.request_timeout();
        match time::timeout(timeout, self.inner.transport.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    /// Queue an event for the next batch. Returns false when not logging.
    pub fn enqueue(&self, event_type: EventType, data: Value) -> bool {
        let pending = {
            let mut state = self.state();
            if !state.logging {
                return false;
            }
            state.queue.push(Event::new(event_type, data));
            state.queue.len()
        };
        tracing::trace!(event_type = %event_type, pending, "Event queued");
        true
    }

    /// Handle a host notification on a new task.
    pub fn notify(&self, notification: HostNotification) {
        let client = self.clone();
        tokio::task::spawn_local(async move {
            client.handle_notification(notification).await;
        });
    }

    /// Map a host notification to its event.
    pub async fn handle_notification(&self, notification: HostNotification) {
        if !self.is_logging() {
            tracing::trace!(source = %notification.source(), "Notification ignored, not logging");
            return;
        }

        match notification {
            HostNotification::SelectionChanged { range } => {
                self.state().detector.seed(&range);
                self.enqueue(
                    EventType::SelectionChanged,
                    events::selection_changed_data(&range),
                );
                self.capture_if_due(&range);
            }
            HostNotification::SheetActivated { sheet } => {
                self.enqueue(EventType::SheetActivated, events::sheet_activated_data(&sheet));
                self.capture_active_selection().await;
            }
            HostNotification::SheetDeactivated { sheet_id } => {
                self.enqueue(
                    EventType::SheetDeactivated,
                    events::sheet_deactivated_data(&sheet_id),
                );
            }
            HostNotification::DocumentSaved => {
                self.enqueue(EventType::WorkbookSaved, events::workbook_saved_data());
            }
            HostNotification::RawSelectionChanged { selection } => {
                self.enqueue(
                    EventType::DocumentSelectionChanged,
                    events::document_selection_data(&selection),
                );
            }
        }
    }

    /// One change-detector tick. Returns the number of changed cells when
    /// a cell_edit event was queued.
    pub async fn poll_changes(&self) -> Option<usize> {
        if !self.is_logging() {
            return None;
        }
        let range = match self.inner.host.selected_range().await {
            Ok(range) => {
                self.state().host_read_failing = false;
                range
            }
            Err(e) => {
                // trace the first failure of a streak, then stay quiet
                let first = !std::mem::replace(&mut self.state().host_read_failing, true);
                if first {
                    tracing::warn!(error = %e, "Change detection read failed");
                } else {
                    tracing::debug!(error = %e, "Change detection read still failing");
                }
                return None;
            }
        };

        let edit = self.state().detector.observe(&range)?;
        let changed = edit.changes.len();
        tracing::debug!(address = %edit.address, changed, "Cell edit detected");

        self.enqueue(EventType::CellEdit, edit.to_payload());
        self.capture_if_due(&range);
        Some(changed)
    }

    /// Capture `range` unless a capture ran within the throttle window.
    pub fn capture_if_due(&self, range: &RangeSnapshot) -> bool {
        if !self.is_logging() {
            return false;
        }
        if !self.state().throttle.try_acquire(Instant::now()) {
            tracing::trace!(address = %range.address, "Content capture throttled");
            return false;
        }
        self.capture_content(range)
    }

    fn capture_content(&self, range: &RangeSnapshot) -> bool {
        let policy = self.inner.capture_policy;
        tracing::debug!(
            address = %range.address,
            rows = range.row_count,
            columns = range.column_count,
            large = policy.is_large(range),
            "Capturing cell content"
        );
        self.enqueue(EventType::CellContent, policy.content_payload(range))
    }

    async fn capture_active_selection(&self) {
        match self.inner.host.selected_range().await {
            Ok(range) => {
                self.capture_content(&range);
            }
            Err(e) => tracing::warn!(error = %e, "Selection capture failed"),
        }
    }

    async fn log_workbook_info(&self) {
        match self.inner.host.workbook_info().await {
            Ok(info) => {
                self.enqueue(EventType::WorkbookInfo, events::workbook_info_data(&info));
            }
            Err(e) => tracing::warn!(error = %e, "Workbook info read failed"),
        }
    }

    /// Record a significant entry and forward it to the sink.
    fn announce(&self, message: impl Into<String>) {
        let entry = self.state().activity.push(message);
        tracing::info!("{}", entry.message);
        self.inner.sink.activity(&entry);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().monitor.status(Instant::now())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state().monitor.state()
    }

    pub fn retry_count(&self) -> u32 {
        self.state().monitor.retry_count()
    }

    pub fn is_logging(&self) -> bool {
        self.state().logging
    }

    pub fn pending_count(&self) -> usize {
        self.state().queue.len()
    }

    /// Copy of the queued events in delivery order
    pub fn pending_events(&self) -> Vec<Event> {
        self.state().queue.iter().cloned().collect()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.state().stats.clone()
    }

    /// The rolling log of significant activity, oldest first
    pub fn recent_activity(&self) -> Vec<ActivityEntry> {
        self.state().activity.entries()
    }
}
