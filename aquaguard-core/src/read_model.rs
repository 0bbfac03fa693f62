//! Read model for the dashboard and other presentation consumers
//!
//! The engine publishes into it once per tick; consumers either poll a
//! [`Snapshot`] or subscribe to the latest classification. Readers never
//! touch engine state directly, so a slow dashboard cannot stall ingestion.
//!
//! ```text
//!  Engine tick ──publish──▶ ReadModel ──snapshot()──▶ poll (HTTP handler)
//!                              │
//!                              └──subscribe()──▶ watch::Receiver (push)
//! ```

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::classifier::ClassificationResult;
use crate::detector::PollutionEvent;
use crate::dispatcher::{AlertLog, AlertRecord};
use crate::errors::IngestError;
use crate::trend::ParameterSummary;

/// Ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Readings that completed a tick
    pub accepted: u64,
    /// Readings rejected at the ingestion boundary
    pub rejected: u64,
    /// Storage sink calls that failed
    pub sink_failures: u64,
    /// Notifications lost to a full dispatch queue
    pub dropped_notifications: u64,
    /// Ticks that ran over the latency budget
    pub slow_ticks: u64,
    /// Trend samples dropped at window capacity before leaving the horizon
    pub window_overwrites: u64,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub latest: Option<ClassificationResult>,
    pub open_events: Vec<PollutionEvent>,
    /// Recently closed events, oldest first
    pub closed_events: Vec<PollutionEvent>,
    /// Window statistics per parameter
    pub summaries: Vec<ParameterSummary>,
    pub counters: Counters,
    /// Why the most recent rejected reading was rejected
    pub last_rejection: Option<String>,
}

/// Cloneable handle to the published engine state
#[derive(Debug, Clone)]
pub struct ReadModel {
    state: Arc<RwLock<Snapshot>>,
    alerts: AlertLog,
    latest_tx: Arc<watch::Sender<Option<ClassificationResult>>>,
}

impl ReadModel {
    pub fn new(alerts: AlertLog) -> Self {
        let (latest_tx, _) = watch::channel(None);
        Self {
            state: Arc::new(RwLock::new(Snapshot::default())),
            alerts,
            latest_tx: Arc::new(latest_tx),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the whole view
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// Latest accepted classification
    pub fn latest(&self) -> Option<ClassificationResult> {
        self.read().latest
    }

    pub fn open_events(&self) -> Vec<PollutionEvent> {
        self.read().open_events.clone()
    }

    pub fn closed_events(&self) -> Vec<PollutionEvent> {
        self.read().closed_events.clone()
    }

    pub fn summaries(&self) -> Vec<ParameterSummary> {
        self.read().summaries.clone()
    }

    pub fn counters(&self) -> Counters {
        self.read().counters
    }

    /// The `n` most recent alert records, oldest first
    pub fn recent_alerts(&self, n: usize) -> Vec<AlertRecord> {
        self.alerts.recent(n)
    }

    /// Shared alert log
    pub fn alert_log(&self) -> &AlertLog {
        &self.alerts
    }

    /// Push side: the receiver sees every new classification
    pub fn subscribe(&self) -> watch::Receiver<Option<ClassificationResult>> {
        self.latest_tx.subscribe()
    }

    pub(crate) fn publish_tick(
        &self,
        result: ClassificationResult,
        open_events: Vec<PollutionEvent>,
        closed_events: Option<Vec<PollutionEvent>>,
        summaries: Vec<ParameterSummary>,
    ) {
        {
            let mut state = self.write();
            state.latest = Some(result);
            state.open_events = open_events;
            if let Some(closed) = closed_events {
                state.closed_events = closed;
            }
            state.summaries = summaries;
            state.counters.accepted += 1;
        }
        self.latest_tx.send_replace(Some(result));
    }

    pub(crate) fn record_rejection(&self, error: &IngestError) {
        let mut state = self.write();
        state.counters.rejected += 1;
        state.last_rejection = Some(error.to_string());
    }

    pub(crate) fn update_counters(&self, update: impl FnOnce(&mut Counters)) {
        update(&mut self.write().counters);
    }
}
