//! Alert Dispatcher: Cooldown-Gated Fan-Out with Isolated Retry
//!
//! ## Overview
//!
//! Ingestion hands every event transition to the dispatcher through a
//! bounded queue and returns immediately. A single dispatcher task consumes
//! the queue in order, decides per channel whether to send, and spawns one
//! task per (notification, channel) for the actual delivery:
//!
//! ```text
//!  ingestion ──try_send──▶ [ queue ] ──▶ dispatcher task
//!                                            │ gate (ledger)
//!                            ┌───────────────┼───────────────┐
//!                            ▼               ▼               ▼
//!                       send task       send task       Suppressed
//!                       (email)         (local)         record
//!                       timeout+retry   timeout+retry
//! ```
//!
//! A slow or failing channel only ever occupies its own send task. The
//! dispatcher task never awaits a send, and ingestion never awaits the
//! dispatcher.
//!
//! ## Gating
//!
//! | Transition | Decision per channel                                          |
//! |------------|---------------------------------------------------------------|
//! | Opened     | send if the channel accepts the severity                      |
//! | Extended   | send if severity rose past the last notification, or the      |
//! |            | cooldown since the last attempt elapsed; else `Suppressed`    |
//! | Closed     | send a resolution notice if the original alert was delivered  |
//!
//! Cooldowns are measured on the tick timestamp axis, so gating decisions do
//! not depend on how long deliveries take.
//!
//! ## Cooldown Ledger
//!
//! One slot per `(event, channel)`. The gating state sits behind a short
//! `std` mutex; a per-slot async lock is held for the whole delivery
//! including retries. The dispatcher takes that lock with `try_lock` before
//! spawning. While a send is still retrying, a same-severity Extended
//! notification is `Suppressed` instead of producing a duplicate, and an
//! escalation is queued on the slot. The running send task delivers it as
//! soon as it finishes, before any resolution notice.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify, OwnedMutexGuard};
use tokio::task::{JoinHandle, JoinSet};

use crate::channel::{AlertChannel, Notification};
use crate::detector::{EventId, EventKind, Severity, TransitionKind};
use crate::errors::{ChannelError, ConfigError, ConfigResult};
use crate::time::{elapsed_ms, Timestamp, MS_PER_MINUTE, MS_PER_SECOND};

/// Dispatcher tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Minimum time between repeat alerts of the same severity
    pub cooldown_ms: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay
    pub backoff_max_ms: u64,
    /// Per-attempt timeout
    pub send_timeout_ms: u64,
    /// Notifications buffered between ingestion and the dispatcher
    pub queue_capacity: usize,
    /// Alert records kept for the read model
    pub log_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 30 * MS_PER_MINUTE,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30 * MS_PER_SECOND,
            send_timeout_ms: 10 * MS_PER_SECOND,
            queue_capacity: 64,
            log_capacity: 256,
        }
    }
}

impl DispatcherConfig {
    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_send_timeout_ms(mut self, send_timeout_ms: u64) -> Self {
        self.send_timeout_ms = send_timeout_ms;
        self
    }

    pub fn with_backoff_ms(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_max_ms = max_ms;
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        let delay = self.backoff_base_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid("send timeout must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("dispatch queue capacity must be non-zero"));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid("backoff maximum below backoff base"));
        }
        Ok(())
    }
}

/// Result of one gating decision on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Delivered, possibly after retries
    Sent,
    /// Every attempt failed or timed out
    Failed,
    /// Held back by the cooldown, nothing was sent
    Suppressed,
}

/// Append-only record of one alert decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub event_id: EventId,
    pub event_kind: EventKind,
    pub transition: TransitionKind,
    pub severity: Severity,
    pub channel: String,
    /// Tick timestamp of the notification
    pub attempted_at: Timestamp,
    pub wall_clock: DateTime<Utc>,
    /// Send attempts made, zero when suppressed
    pub attempts: u32,
    pub outcome: AlertOutcome,
    /// Last error when the outcome is `Failed`
    pub error: Option<String>,
}

impl AlertRecord {
    fn new(notification: &Notification, channel: &str, attempts: u32, outcome: AlertOutcome) -> Self {
        Self {
            event_id: notification.event_id,
            event_kind: notification.event_kind,
            transition: notification.transition,
            severity: notification.severity,
            channel: channel.to_string(),
            attempted_at: notification.at,
            wall_clock: notification.wall_clock,
            attempts,
            outcome,
            error: None,
        }
    }
}

#[derive(Debug)]
struct LogInner {
    records: VecDeque<AlertRecord>,
    appended: u64,
}

/// Bounded, shared log of recent alert records
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone)]
pub struct AlertLog {
    inner: Arc<Mutex<LogInner>>,
    capacity: usize,
    appended_notify: Arc<Notify>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                records: VecDeque::with_capacity(capacity.min(1024)),
                appended: 0,
            })),
            capacity,
            appended_notify: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, record: AlertRecord) {
        {
            let mut inner = self.lock();
            if self.capacity > 0 {
                if inner.records.len() >= self.capacity {
                    inner.records.pop_front();
                }
                inner.records.push_back(record);
            }
            inner.appended += 1;
        }
        self.appended_notify.notify_waiters();
    }

    /// Copy of every retained record, oldest first
    pub fn snapshot(&self) -> Vec<AlertRecord> {
        self.lock().records.iter().cloned().collect()
    }

    /// The `n` most recent records, oldest first
    pub fn recent(&self, n: usize) -> Vec<AlertRecord> {
        let inner = self.lock();
        let skip = inner.records.len().saturating_sub(n);
        inner.records.iter().skip(skip).cloned().collect()
    }

    /// Retained records for one event, oldest first
    pub fn for_event(&self, event_id: EventId) -> Vec<AlertRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records ever appended, including ones already dropped
    pub fn total_appended(&self) -> u64 {
        self.lock().appended
    }

    /// Wait until at least `count` records have ever been appended
    pub async fn wait_for(&self, count: u64) {
        loop {
            let notified = self.appended_notify.notified();
            if self.total_appended() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(DispatcherConfig::default().log_capacity)
    }
}

/// Gating state of one (event, channel) pair
#[derive(Debug, Default)]
struct LedgerState {
    last_attempt_at: Option<Timestamp>,
    last_severity: Option<Severity>,
    delivered: bool,
    /// Escalation waiting for the delivery in flight to finish
    queued: Option<Arc<Notification>>,
}

#[derive(Debug, Default)]
struct LedgerSlot {
    state: Mutex<LedgerState>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl LedgerSlot {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type LedgerKey = (EventId, String);

/// Per-(event, channel) cooldown ledger
#[derive(Debug, Default)]
struct CooldownLedger {
    slots: Mutex<HashMap<LedgerKey, Arc<LedgerSlot>>>,
}

impl CooldownLedger {
    fn slots(&self) -> MutexGuard<'_, HashMap<LedgerKey, Arc<LedgerSlot>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get(&self, event_id: EventId, channel: &str) -> Option<Arc<LedgerSlot>> {
        self.slots().get(&(event_id, channel.to_string())).cloned()
    }

    fn get_or_insert(&self, event_id: EventId, channel: &str) -> Arc<LedgerSlot> {
        self.slots()
            .entry((event_id, channel.to_string()))
            .or_default()
            .clone()
    }

    fn remove(&self, event_id: EventId, channel: &str) {
        self.slots().remove(&(event_id, channel.to_string()));
    }
}

/// Counters shared between the handle and the dispatcher task
#[derive(Debug, Default)]
struct DispatchCounters {
    queued: AtomicU64,
    dropped: AtomicU64,
}

/// Ingestion-side handle to a running dispatcher
#[derive(Debug)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Notification>,
    counters: Arc<DispatchCounters>,
    log: AlertLog,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Queue a notification without waiting
    ///
    /// Returns `false` when the queue is full or the dispatcher has stopped;
    /// the notification is then dropped and counted.
    pub fn submit(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(n)) => {
                log::warn!("Dispatch queue full, dropping notification for event #{}", n.event_id);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                log::error!("Dispatcher stopped, dropping notification for event #{}", n.event_id);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Notifications accepted into the queue
    pub fn queued(&self) -> u64 {
        self.counters.queued.load(Ordering::Relaxed)
    }

    /// Notifications lost to a full or closed queue
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn log(&self) -> &AlertLog {
        &self.log
    }

    /// Stop accepting notifications and wait for in-flight deliveries
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            log::error!("Dispatcher task failed: {}", e);
        }
    }
}

/// Alert dispatcher state, owned by the dispatcher task
pub struct AlertDispatcher {
    config: DispatcherConfig,
    channels: Vec<Arc<dyn AlertChannel>>,
    ledger: Arc<CooldownLedger>,
    log: AlertLog,
    tasks: JoinSet<()>,
}

impl AlertDispatcher {
    pub fn new(config: DispatcherConfig, channels: Vec<Arc<dyn AlertChannel>>, log: AlertLog) -> Self {
        Self {
            config,
            channels,
            ledger: Arc::new(CooldownLedger::default()),
            log,
            tasks: JoinSet::new(),
        }
    }

    /// Start the dispatcher task on the current tokio runtime
    pub fn spawn(self) -> DispatcherHandle {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let log = self.log.clone();
        let task = tokio::spawn(self.run(rx));
        DispatcherHandle {
            tx,
            counters: Arc::new(DispatchCounters::default()),
            log,
            task,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Notification>) {
        log::debug!("Dispatcher started with {} channel(s)", self.channels.len());
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(notification) => self.dispatch(notification),
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        log::error!("Alert send task failed: {}", e);
                    }
                }
            }
        }

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("Alert send task failed: {}", e);
            }
        }
        log::debug!("Dispatcher stopped");
    }

    /// Gate one notification on every channel and spawn the sends
    pub fn dispatch(&mut self, notification: Notification) {
        let notification = Arc::new(notification);
        for channel in self.channels.clone() {
            match notification.transition {
                TransitionKind::Opened | TransitionKind::Extended => {
                    self.gate_alert(&notification, channel);
                }
                TransitionKind::Closed => self.gate_resolution(&notification, channel),
            }
        }
    }

    fn gate_alert(&mut self, notification: &Arc<Notification>, channel: Arc<dyn AlertChannel>) {
        let name = channel.name().to_string();
        let existing = self.ledger.get(notification.event_id, &name);

        let slot = match existing {
            Some(slot) => slot,
            None if channel.accepts(notification.severity) => {
                self.ledger.get_or_insert(notification.event_id, &name)
            }
            // Channel was never alerted and this severity is not for it
            None => return,
        };

        let guard = {
            let mut state = slot.state();
            let Ok(guard) = slot.in_flight.clone().try_lock_owned() else {
                if state.last_severity.is_some_and(|last| notification.severity <= last) {
                    log::debug!("#{} on {}: delivery in flight", notification.event_id, name);
                    self.log.push(AlertRecord::new(notification, &name, 0, AlertOutcome::Suppressed));
                } else {
                    log::debug!(
                        "#{} on {}: escalation to {} queued behind delivery in flight",
                        notification.event_id,
                        name,
                        notification.severity
                    );
                    state.last_severity = Some(notification.severity);
                    state.queued = Some(Arc::clone(notification));
                }
                return;
            };

            if let (Some(last_at), Some(last_severity)) = (state.last_attempt_at, state.last_severity) {
                let escalated = notification.severity > last_severity;
                let cooled = elapsed_ms(last_at, notification.at) >= self.config.cooldown_ms;
                if !escalated && !cooled {
                    log::debug!("#{} on {}: suppressed by cooldown", notification.event_id, name);
                    self.log.push(AlertRecord::new(notification, &name, 0, AlertOutcome::Suppressed));
                    return;
                }
            }
            state.last_attempt_at = Some(notification.at);
            state.last_severity = Some(notification.severity);
            guard
        };

        let config = self.config;
        let log = self.log.clone();
        let mut current = Arc::clone(notification);
        self.tasks.spawn(async move {
            let mut guard = Some(guard);
            loop {
                let record = deliver(channel.as_ref(), &current, &config).await;
                let queued = {
                    let mut state = slot.state();
                    if record.outcome == AlertOutcome::Sent {
                        state.delivered = true;
                    }
                    let queued = state.queued.take();
                    match &queued {
                        Some(next) => state.last_attempt_at = Some(next.at),
                        // Released under the state lock so an escalation either queues or acquires
                        None => drop(guard.take()),
                    }
                    queued
                };
                log.push(record);
                match queued {
                    Some(next) => current = next,
                    None => break,
                }
            }
        });
    }

    fn gate_resolution(&mut self, notification: &Arc<Notification>, channel: Arc<dyn AlertChannel>) {
        let name = channel.name().to_string();
        let Some(slot) = self.ledger.get(notification.event_id, &name) else {
            return;
        };

        let config = self.config;
        let log = self.log.clone();
        let ledger = Arc::clone(&self.ledger);
        let notification = Arc::clone(notification);
        let in_flight = Arc::clone(&slot.in_flight);
        self.tasks.spawn(async move {
            // Wait for a delivery of this event that is still retrying
            let guard: OwnedMutexGuard<()> = in_flight.lock_owned().await;
            let delivered = slot.state().delivered;
            let record = if delivered {
                Some(deliver(channel.as_ref(), &notification, &config).await)
            } else {
                log::debug!("#{} on {}: never delivered, no resolution", notification.event_id, name);
                None
            };
            ledger.remove(notification.event_id, &name);
            drop(guard);
            if let Some(record) = record {
                log.push(record);
            }
        });
    }
}

/// Send with per-attempt timeout and exponential backoff
async fn deliver(
    channel: &dyn AlertChannel,
    notification: &Notification,
    config: &DispatcherConfig,
) -> AlertRecord {
    let name = channel.name();
    let timeout = Duration::from_millis(config.send_timeout_ms);
    let mut last_error = None;
    let mut attempts = 0;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            tokio::time::sleep(config.backoff(attempt)).await;
        }
        attempts += 1;

        let error = match tokio::time::timeout(timeout, channel.send(notification)).await {
            Ok(Ok(())) => {
                log::info!(
                    "Alert #{} ({:?}) sent on {} after {} attempt(s)",
                    notification.event_id,
                    notification.transition,
                    name,
                    attempts
                );
                return AlertRecord::new(notification, name, attempts, AlertOutcome::Sent);
            }
            Ok(Err(e)) => e,
            Err(_) => ChannelError::Timeout(config.send_timeout_ms),
        };

        log::warn!(
            "Alert #{} on {} attempt {}/{} failed: {}",
            notification.event_id,
            name,
            attempts,
            config.max_retries + 1,
            error
        );
        let retryable = !matches!(error, ChannelError::Disabled | ChannelError::Format(_));
        last_error = Some(error);
        if !retryable {
            break;
        }
    }

    log::error!("Alert #{} failed on {} after {} attempt(s)", notification.event_id, name, attempts);
    let mut record = AlertRecord::new(notification, name, attempts, AlertOutcome::Failed);
    record.error = last_error.map(|e| e.to_string());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{EventTransition, PollutionEvent};
    use crate::reading::Reading;
    use crate::thresholds::Tier;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct Scripted {
        name: &'static str,
        failures: AtomicU32,
        calls: AtomicU32,
        min_severity: Severity,
        delay: Duration,
        sent: Mutex<Vec<(TransitionKind, Severity)>>,
    }

    impl Scripted {
        fn new(name: &'static str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                min_severity: Severity::Info,
                delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures: AtomicU32::new(0),
                calls: AtomicU32::new(0),
                min_severity: Severity::Info,
                delay,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(TransitionKind, Severity)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertChannel for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn min_severity(&self) -> Severity {
            self.min_severity
        }

        async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ChannelError::Transport("refused".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((notification.transition, notification.severity));
            Ok(())
        }
    }

    fn notification(kind: TransitionKind, severity: Severity, at: Timestamp) -> Notification {
        let transition = EventTransition {
            kind,
            event: PollutionEvent {
                id: 1,
                kind: EventKind::RapidChange,
                severity,
                opened_at: 0,
                opened_wall_clock: DateTime::default(),
                last_extended_at: at,
                closed_at: None,
                triggering_readings: heapless::Vec::new(),
                resolved: kind == TransitionKind::Closed,
                description: "pH changed".into(),
            },
            at,
            escalated: false,
        };
        Notification::from_transition(&transition, Tier::Good, Reading::new(at, 7.6, 2.0, 20.0))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = DispatcherConfig::default().with_backoff_ms(100, 500);
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(400));
        assert_eq!(config.backoff(4), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_sends() {
        let channel = Scripted::new("flaky", 2);
        let log = AlertLog::new(16);
        let handle = AlertDispatcher::new(
            DispatcherConfig::default(),
            vec![channel.clone() as Arc<dyn AlertChannel>],
            log.clone(),
        )
        .spawn();

        assert!(handle.submit(notification(TransitionKind::Opened, Severity::Warning, 0)));
        log.wait_for(1).await;

        let records = log.snapshot();
        assert_eq!(records[0].outcome, AlertOutcome::Sent);
        assert_eq!(records[0].attempts, 3);
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let channel = Scripted::new("down", 100);
        let log = AlertLog::new(16);
        let config = DispatcherConfig::default().with_max_retries(3);
        let handle =
            AlertDispatcher::new(config, vec![channel.clone() as Arc<dyn AlertChannel>], log.clone()).spawn();

        handle.submit(notification(TransitionKind::Opened, Severity::Warning, 0));
        log.wait_for(1).await;

        let record = &log.snapshot()[0];
        assert_eq!(record.outcome, AlertOutcome::Failed);
        assert_eq!(record.attempts, 4);
        assert!(record.error.as_deref().unwrap_or_default().contains("refused"));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn extended_within_cooldown_is_suppressed() {
        let channel = Scripted::new("local", 0);
        let log = AlertLog::new(16);
        let handle = AlertDispatcher::new(
            DispatcherConfig::default(),
            vec![channel.clone() as Arc<dyn AlertChannel>],
            log.clone(),
        )
        .spawn();

        handle.submit(notification(TransitionKind::Opened, Severity::Warning, 0));
        log.wait_for(1).await;
        handle.submit(notification(TransitionKind::Extended, Severity::Warning, 10 * MS_PER_MINUTE));
        log.wait_for(2).await;
        // Escalation bypasses the cooldown
        handle.submit(notification(TransitionKind::Extended, Severity::Critical, 11 * MS_PER_MINUTE));
        log.wait_for(3).await;
        // Cooldown elapsed since the last attempt at minute 11
        handle.submit(notification(TransitionKind::Extended, Severity::Critical, 41 * MS_PER_MINUTE));
        log.wait_for(4).await;

        let outcomes: Vec<AlertOutcome> = log.snapshot().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AlertOutcome::Sent,
                AlertOutcome::Suppressed,
                AlertOutcome::Sent,
                AlertOutcome::Sent
            ]
        );
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn escalation_waits_for_delivery_in_flight() {
        let channel = Scripted::slow("sms", Duration::from_secs(5));
        let log = AlertLog::new(16);
        let handle = AlertDispatcher::new(
            DispatcherConfig::default(),
            vec![channel.clone() as Arc<dyn AlertChannel>],
            log.clone(),
        )
        .spawn();

        handle.submit(notification(TransitionKind::Opened, Severity::Warning, 0));
        handle.submit(notification(TransitionKind::Extended, Severity::Warning, 5 * MS_PER_SECOND));
        handle.submit(notification(TransitionKind::Extended, Severity::Critical, 10 * MS_PER_SECOND));
        handle.submit(notification(TransitionKind::Closed, Severity::Critical, 700 * MS_PER_SECOND));
        log.wait_for(4).await;
        handle.shutdown().await;

        assert_eq!(
            channel.sent(),
            vec![
                (TransitionKind::Opened, Severity::Warning),
                (TransitionKind::Extended, Severity::Critical),
                (TransitionKind::Closed, Severity::Critical),
            ]
        );

        let records = log.snapshot();
        let suppressed: Vec<&AlertRecord> =
            records.iter().filter(|r| r.outcome == AlertOutcome::Suppressed).collect();
        assert_eq!(suppressed.len(), 1);
        assert_eq!(suppressed[0].severity, Severity::Warning);

        let escalation = records
            .iter()
            .find(|r| r.transition == TransitionKind::Extended && r.severity == Severity::Critical)
            .unwrap();
        assert_eq!(escalation.outcome, AlertOutcome::Sent);
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_only_where_delivered() {
        let ok = Scripted::new("ok", 0);
        let down = Scripted::new("down", 100);
        let log = AlertLog::new(16);
        let config = DispatcherConfig::default().with_max_retries(0);
        let handle = AlertDispatcher::new(
            config,
            vec![ok.clone() as Arc<dyn AlertChannel>, down.clone() as Arc<dyn AlertChannel>],
            log.clone(),
        )
        .spawn();

        handle.submit(notification(TransitionKind::Opened, Severity::Warning, 0));
        log.wait_for(2).await;
        handle.submit(notification(TransitionKind::Closed, Severity::Warning, 20 * MS_PER_MINUTE));
        log.wait_for(3).await;
        handle.shutdown().await;

        let resolutions: Vec<AlertRecord> = log
            .snapshot()
            .into_iter()
            .filter(|r| r.transition == TransitionKind::Closed)
            .collect();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].channel, "ok");
        assert_eq!(resolutions[0].outcome, AlertOutcome::Sent);
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn min_severity_filters_channels() {
        let pager = Arc::new(Scripted {
            name: "pager",
            failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            min_severity: Severity::Critical,
            delay: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        });
        let log = AlertLog::new(16);
        let handle = AlertDispatcher::new(
            DispatcherConfig::default(),
            vec![pager.clone() as Arc<dyn AlertChannel>],
            log.clone(),
        )
        .spawn();

        handle.submit(notification(TransitionKind::Opened, Severity::Warning, 0));
        handle.submit(notification(TransitionKind::Extended, Severity::Critical, MS_PER_MINUTE));
        log.wait_for(1).await;
        handle.shutdown().await;

        let records = log.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Critical);
        assert_eq!(pager.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn info_notices_reach_only_info_channels() {
        let local = Scripted::new("local", 0);
        let email = Arc::new(Scripted {
            name: "email",
            failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            min_severity: Severity::Warning,
            delay: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
        });
        let log = AlertLog::new(16);
        let handle = AlertDispatcher::new(
            DispatcherConfig::default(),
            vec![local.clone() as Arc<dyn AlertChannel>, email.clone() as Arc<dyn AlertChannel>],
            log.clone(),
        )
        .spawn();

        handle.submit(notification(TransitionKind::Opened, Severity::Info, 0));
        log.wait_for(1).await;
        handle.shutdown().await;

        assert_eq!(local.sent(), vec![(TransitionKind::Opened, Severity::Info)]);
        assert_eq!(email.calls.load(Ordering::SeqCst), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn log_is_bounded() {
        let log = AlertLog::new(2);
        for at in 0..3 {
            log.push(AlertRecord::new(
                &notification(TransitionKind::Opened, Severity::Info, at),
                "local",
                1,
                AlertOutcome::Sent,
            ));
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_appended(), 3);
        assert_eq!(log.recent(1)[0].attempted_at, 2);
    }
}
