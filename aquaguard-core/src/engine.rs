//! Ingestion Engine: One Synchronous Tick per Reading
//!
//! ## Overview
//!
//! The engine is the single consumer of the reading stream. Each call to
//! [`Engine::submit_reading`] runs one complete tick on the caller's thread:
//!
//! ```text
//!  Reading
//!    │ 1. physical limits   ──▶ IngestError::{InvalidValue, OutOfRange}
//!    │ 2. strictly later    ──▶ IngestError::NonMonotonic
//!    ▼
//!  Classifier ──▶ TrendWindow ──▶ EventDetector
//!                                     │ transitions
//!          ┌──────────────────────────┼───────────────────────┐
//!          ▼                          ▼                       ▼
//!     StorageSink               DispatcherHandle          ReadModel
//!   (errors logged)           (try_send, never waits)    (publish)
//! ```
//!
//! A rejected reading touches no state beyond the rejection counter, so the
//! last valid classification stays in effect and no event can be triggered
//! by a malformed sample.
//!
//! ## Latency
//!
//! Everything above runs without awaiting anything. Channel I/O happens on
//! dispatcher tasks. Each tick is timed and ticks over the configured budget
//! are logged, never failed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::{AlertChannel, Notification};
use crate::classifier::{ClassificationResult, Classifier};
use crate::config::EngineConfig;
use crate::detector::{EventDetector, EventTransition, TransitionKind};
use crate::dispatcher::{AlertDispatcher, AlertLog, DispatcherHandle};
use crate::errors::{ConfigError, ConfigResult, IngestError, IngestResult};
use crate::read_model::ReadModel;
use crate::reading::{Parameter, Reading, PARAMETER_COUNT};
use crate::sink::{NullSink, StorageSink};
use crate::time::Timestamp;
use crate::trend::{TrendStat, TrendWindow, WINDOW_CAPACITY};

/// Everything one accepted reading produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub classification: ClassificationResult,
    pub stats: [TrendStat; PARAMETER_COUNT],
    pub transitions: Vec<EventTransition>,
    /// Processing time of the tick
    pub elapsed: Duration,
}

/// Streaming classification and event detection engine
pub struct Engine {
    config: EngineConfig,
    classifier: Classifier,
    trend: TrendWindow,
    detector: EventDetector,
    sink: Box<dyn StorageSink>,
    dispatcher: Option<DispatcherHandle>,
    read_model: ReadModel,
    last_accepted: Option<Timestamp>,
    overwrites_seen: u64,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Ingest one reading
    pub fn submit_reading(&mut self, reading: Reading) -> IngestResult<()> {
        self.process(reading).map(|_| ())
    }

    /// Ingest one reading and return what the tick produced
    pub fn process(&mut self, reading: Reading) -> IngestResult<TickReport> {
        let started = Instant::now();

        if let Err(e) = self.admit(&reading) {
            log::warn!("Rejected reading at {}ms: {}", reading.timestamp, e);
            self.read_model.record_rejection(&e);
            return Err(e);
        }
        self.last_accepted = Some(reading.timestamp);

        let classification = self.classifier.classify(&reading);
        let stats = self.trend.update(&reading);
        self.track_overwrites();
        let transitions = self.detector.evaluate(&classification, &stats);

        self.persist(&classification, &transitions);
        self.notify(&classification, &transitions);
        self.publish(classification, &transitions);

        let elapsed = started.elapsed();
        log::trace!(
            "Tick {}ms: {} (score {:.1}) in {}µs",
            reading.timestamp,
            classification.tier,
            classification.score,
            elapsed.as_micros()
        );
        if elapsed > Duration::from_millis(self.config.latency_budget_ms) {
            log::warn!(
                "Tick {}ms took {}ms, over the {}ms budget",
                reading.timestamp,
                elapsed.as_millis(),
                self.config.latency_budget_ms
            );
            self.read_model.update_counters(|c| c.slow_ticks += 1);
        }

        Ok(TickReport {
            classification,
            stats,
            transitions,
            elapsed,
        })
    }

    fn admit(&self, reading: &Reading) -> IngestResult<()> {
        self.config.limits.check(reading)?;
        match self.last_accepted {
            Some(last) if reading.timestamp <= last => Err(IngestError::NonMonotonic {
                timestamp: reading.timestamp,
                last_accepted: last,
            }),
            _ => Ok(()),
        }
    }

    fn track_overwrites(&mut self) {
        let overwritten = self.trend.overwritten();
        if overwritten == self.overwrites_seen {
            return;
        }
        if self.overwrites_seen == 0 {
            log::warn!(
                "Trend window full at {} samples, readings arrive too fast for the {}ms horizon",
                WINDOW_CAPACITY,
                self.config.trend.max_horizon_ms()
            );
        }
        self.overwrites_seen = overwritten;
        self.read_model.update_counters(|c| c.window_overwrites = overwritten);
    }

    fn persist(&mut self, classification: &ClassificationResult, transitions: &[EventTransition]) {
        let mut failures = 0;
        if let Err(e) = self.sink.persist_classification(classification) {
            log::warn!("Storage sink rejected classification at {}ms: {}", classification.timestamp(), e);
            failures += 1;
        }
        for transition in transitions {
            if let Err(e) = self.sink.persist_transition(transition) {
                log::warn!("Storage sink rejected event #{} transition: {}", transition.event.id, e);
                failures += 1;
            }
        }
        if failures > 0 {
            self.read_model.update_counters(|c| c.sink_failures += failures);
        }
    }

    fn notify(&self, classification: &ClassificationResult, transitions: &[EventTransition]) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        for transition in transitions {
            let notification =
                Notification::from_transition(transition, classification.tier, classification.reading);
            if !dispatcher.submit(notification) {
                self.read_model.update_counters(|c| c.dropped_notifications += 1);
            }
        }
    }

    fn publish(&self, classification: ClassificationResult, transitions: &[EventTransition]) {
        let closed_changed = transitions.iter().any(|t| t.kind == TransitionKind::Closed);
        self.read_model.publish_tick(
            classification,
            self.detector.open_events().cloned().collect(),
            closed_changed.then(|| self.detector.closed_events().cloned().collect()),
            Parameter::ALL
                .iter()
                .filter_map(|p| self.trend.summary(*p))
                .collect(),
        );
    }

    /// Cloneable handle for presentation consumers
    pub fn read_model(&self) -> ReadModel {
        self.read_model.clone()
    }

    pub fn alert_log(&self) -> &AlertLog {
        self.read_model.alert_log()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detector(&self) -> &EventDetector {
        &self.detector
    }

    pub fn trend(&self) -> &TrendWindow {
        &self.trend
    }

    /// Timestamp of the last accepted reading
    pub fn last_accepted(&self) -> Option<Timestamp> {
        self.last_accepted
    }

    /// Stop the dispatcher after in-flight deliveries finish
    pub async fn shutdown(self) {
        if let Some(dispatcher) = self.dispatcher {
            dispatcher.shutdown().await;
        }
    }
}

/// Builder for [`Engine`]
///
/// ```rust
/// use aquaguard_core::{Engine, MemorySink, Reading};
///
/// let mut engine = Engine::builder().sink(MemorySink::default()).build()?;
/// engine.submit_reading(Reading::new(0, 7.2, 3.5, 20.0))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    sink: Box<dyn StorageSink>,
    channels: Vec<Arc<dyn AlertChannel>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            sink: Box::new(NullSink),
            channels: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink<S: StorageSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Add an alert channel
    pub fn channel<C: AlertChannel + 'static>(mut self, channel: C) -> Self {
        self.channels.push(Arc::new(channel));
        self
    }

    /// Add an alert channel the caller keeps a handle to
    pub fn shared_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Validate the configuration and start the dispatcher
    ///
    /// With channels configured this must run inside a tokio runtime.
    pub fn build(self) -> ConfigResult<Engine> {
        self.config.validate()?;

        let log = AlertLog::new(self.config.dispatcher.log_capacity);
        let dispatcher = if self.channels.is_empty() {
            None
        } else {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(ConfigError::Invalid("alert channels need a tokio runtime"));
            }
            log::info!("Starting alert dispatcher with {} channel(s)", self.channels.len());
            Some(AlertDispatcher::new(self.config.dispatcher, self.channels, log.clone()).spawn())
        };

        Ok(Engine {
            classifier: Classifier::new(self.config.thresholds.clone())?,
            trend: TrendWindow::new(self.config.trend),
            detector: EventDetector::new(self.config.detector),
            sink: self.sink,
            dispatcher,
            read_model: ReadModel::new(log),
            last_accepted: None,
            overwrites_seen: 0,
            config: self.config,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::sync::Mutex;

    fn engine() -> Engine {
        Engine::builder().build().unwrap()
    }

    #[test]
    fn accepts_and_publishes() {
        let mut engine = engine();
        engine.submit_reading(Reading::new(0, 7.2, 3.5, 20.0)).unwrap();

        let latest = engine.read_model().latest().unwrap();
        assert_eq!(latest.tier, crate::thresholds::Tier::Excellent);
        assert_eq!(engine.read_model().counters().accepted, 1);
        assert_eq!(engine.read_model().summaries().len(), 3);
    }

    #[test]
    fn rejects_non_monotonic_and_keeps_state() {
        let mut engine = engine();
        engine.submit_reading(Reading::new(10_000, 7.0, 2.0, 20.0)).unwrap();

        let err = engine.submit_reading(Reading::new(10_000, 9.9, 2.0, 20.0)).unwrap_err();
        assert_eq!(
            err,
            IngestError::NonMonotonic {
                timestamp: 10_000,
                last_accepted: 10_000
            }
        );
        assert!(engine.submit_reading(Reading::new(5_000, 7.0, 2.0, 20.0)).is_err());

        let model = engine.read_model();
        assert_eq!(model.latest().map(|r| r.reading.ph), Some(7.0));
        assert_eq!(model.counters().rejected, 2);
        assert_eq!(engine.last_accepted(), Some(10_000));
    }

    #[test]
    fn out_of_range_never_triggers_events() {
        let mut engine = engine();
        engine.submit_reading(Reading::new(0, 7.0, 2.0, 20.0)).unwrap();
        assert!(engine.submit_reading(Reading::new(10_000, 14.5, 2.0, 20.0)).is_err());
        let report = engine.process(Reading::new(20_000, 7.1, 2.0, 20.0)).unwrap();
        assert!(report.transitions.is_empty());
        assert_eq!(engine.detector().open_events().count(), 0);
    }

    #[test]
    fn sink_failures_are_counted_not_fatal() {
        let sink = Arc::new(Mutex::new(MemorySink::new(1).rejecting()));
        let mut engine = Engine::builder().sink(sink.clone()).build().unwrap();

        for t in 0..3u64 {
            engine.submit_reading(Reading::new(t * 10_000, 7.0, 2.0, 20.0)).unwrap();
        }
        assert_eq!(engine.read_model().counters().sink_failures, 2);
        assert_eq!(sink.lock().unwrap().classifications().count(), 1);
    }

    #[test]
    fn window_overwrites_are_reported() {
        let mut engine = engine();
        for t in 0..300u64 {
            engine.submit_reading(Reading::new(t * 1_000, 7.0, 2.0, 20.0)).unwrap();
        }
        let overwritten = engine.trend().overwritten();
        assert!(overwritten > 0);
        assert_eq!(engine.read_model().counters().window_overwrites, overwritten);
    }

    #[test]
    fn normal_cadence_overwrites_nothing() {
        let mut engine = engine();
        for t in 0..300u64 {
            engine.submit_reading(Reading::new(t * 10_000, 7.0, 2.0, 20.0)).unwrap();
        }
        assert_eq!(engine.read_model().counters().window_overwrites, 0);
    }

    #[test]
    fn invalid_config_refuses_to_build() {
        let mut config = EngineConfig::default();
        config.thresholds.ph.clear();
        assert!(Engine::builder().config(config).build().is_err());
    }

    #[test]
    fn channels_require_a_runtime() {
        struct Quiet;

        #[async_trait::async_trait]
        impl AlertChannel for Quiet {
            fn name(&self) -> &str {
                "quiet"
            }

            async fn send(&self, _n: &Notification) -> Result<(), crate::errors::ChannelError> {
                Ok(())
            }
        }

        assert!(Engine::builder().channel(Quiet).build().is_err());
    }
}
