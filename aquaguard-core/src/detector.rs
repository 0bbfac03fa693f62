//! Event Detector: Per-Type Pollution Event State Machines
//!
//! ## Overview
//!
//! The detector turns the per-tick classification and trend statistics into
//! a lifecycle of [`PollutionEvent`]s. Each event type runs its own state
//! machine, so a RapidChange and a SustainedPoor event can be open at the same
//! time without interfering.
//!
//! ```text
//!                qualifying × confirm_ticks
//!   ┌────────┐   (and re-armed)             ┌────────┐
//!   │  Idle  │ ───────────────────────────▶ │  Open  │ ◀─┐ qualifying tick
//!   │ streak │                              │        │ ──┘ (Extended)
//!   └────────┘ ◀─────────────────────────── └────────┘
//!          no qualifying tick for grace period (Closed)
//! ```
//!
//! ## Trigger Conditions
//!
//! | Type                | Condition (defaults)                               |
//! |---------------------|----------------------------------------------------|
//! | RapidChange         | pH \|delta\| > 0.5 within the window               |
//! | Spike               | turbidity percent change > 50% within the window   |
//! | Anomaly             | temperature \|delta\| > 5 °C within the window     |
//! | CombinedDegradation | ≥ 2 parameters at tier ≥ Poor on the same tick     |
//! | SustainedPoor       | overall tier ≥ Poor continuously for ≥ 1 hour      |
//!
//! Insufficient trend data never qualifies. All types are evaluated every
//! tick and never suppress each other.
//!
//! ## Determinism
//!
//! Time only advances with reading timestamps and event ids are sequential,
//! so replaying the same readings through a fresh detector reproduces the same
//! events with the same timestamps.

use std::collections::VecDeque;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use heapless::Deque;
use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationResult;
use crate::errors::{ConfigError, ConfigResult};
use crate::reading::{Parameter, Reading, PARAMETER_COUNT};
use crate::thresholds::Tier;
use crate::time::{elapsed_ms, Timestamp, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND};
use crate::trend::TrendStat;

/// Readings kept as the triggering snapshot of an event
pub const SNAPSHOT_CAPACITY: usize = 8;

/// Number of event types
pub const EVENT_KIND_COUNT: usize = 5;

/// Sequential event identifier, starting at 1
pub type EventId = u64;

/// Bounded snapshot of the readings leading up to an event
pub type ReadingSnapshot = heapless::Vec<Reading, SNAPSHOT_CAPACITY>;

/// Pollution event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// pH moved too far within the trend window
    RapidChange,
    /// Turbidity rose sharply within the trend window
    Spike,
    /// Temperature moved too far within the trend window
    Anomaly,
    /// Several parameters degraded at once
    CombinedDegradation,
    /// Overall quality stayed poor for a long time
    SustainedPoor,
}

impl EventKind {
    /// All types in evaluation order
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::RapidChange,
        EventKind::Spike,
        EventKind::Anomaly,
        EventKind::CombinedDegradation,
        EventKind::SustainedPoor,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            EventKind::RapidChange => "rapid_change",
            EventKind::Spike => "spike",
            EventKind::Anomaly => "anomaly",
            EventKind::CombinedDegradation => "combined_degradation",
            EventKind::SustainedPoor => "sustained_poor",
        }
    }

    pub const fn index(&self) -> usize {
        match self {
            EventKind::RapidChange => 0,
            EventKind::Spike => 1,
            EventKind::Anomaly => 2,
            EventKind::CombinedDegradation => 3,
            EventKind::SustainedPoor => 4,
        }
    }

    /// Severity an event of this type opens with
    pub const fn base_severity(&self) -> Severity {
        match self {
            EventKind::CombinedDegradation => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Alert severity, ordered from least to most urgent
///
/// The detector only ever produces `Warning` and `Critical`. `Info` is
/// reserved for notifications submitted straight to an
/// [`AlertDispatcher`](crate::AlertDispatcher) by other producers, such as
/// maintenance or calibration notices, and for channel routing thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Upper-case label used in alert subjects
    pub const fn label(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// A detected pollution event
///
/// Created and mutated only by the [`EventDetector`]. Everyone else sees
/// clones carried by [`EventTransition`]s or the read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub severity: Severity,
    pub opened_at: Timestamp,
    /// Wall clock of the opening reading
    pub opened_wall_clock: DateTime<Utc>,
    pub last_extended_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    /// Readings up to and including the one that opened the event
    pub triggering_readings: ReadingSnapshot,
    pub resolved: bool,
    /// Human-readable summary of the triggering values
    pub description: String,
}

impl PollutionEvent {
    pub fn is_open(&self) -> bool {
        !self.resolved
    }

    /// Time from opening to close, or to the last extension while open
    pub fn duration_ms(&self) -> u64 {
        elapsed_ms(self.opened_at, self.closed_at.unwrap_or(self.last_extended_at))
    }
}

/// Lifecycle step reported to the dispatcher and storage sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Opened,
    Extended,
    Closed,
}

/// One event lifecycle step, in tick order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTransition {
    pub kind: TransitionKind,
    /// Event state right after the transition
    pub event: PollutionEvent,
    /// Timestamp of the tick that caused it
    pub at: Timestamp,
    /// Severity rose on this tick
    pub escalated: bool,
}

/// Externally visible state of one event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Not active; `pending` qualifying ticks seen so far
    Idle { pending: u32 },
    /// Active event with the given id
    Open { id: EventId },
}

/// Detector tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// RapidChange: minimum absolute pH delta (exclusive)
    pub ph_delta_threshold: f32,
    /// Spike: minimum turbidity rise in percent (exclusive)
    pub turbidity_spike_percent: f32,
    /// Anomaly: minimum absolute temperature delta in °C (exclusive)
    pub temperature_delta_threshold: f32,
    /// CombinedDegradation: tier a parameter must reach
    pub combined_tier: Tier,
    /// CombinedDegradation: parameters that must reach it together
    pub combined_min_parameters: usize,
    /// SustainedPoor: tier the overall reading must stay at or above
    pub sustained_tier: Tier,
    /// SustainedPoor: streak length required
    pub sustained_duration_ms: u64,
    /// Time without a qualifying tick before an open event closes
    pub grace_period_ms: u64,
    /// Consecutive qualifying ticks needed to open
    pub confirm_ticks: u32,
    /// Minimum time after a close before the same type may reopen
    pub rearm_after_ms: u64,
    /// Recently closed events kept for the read model
    pub closed_history: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ph_delta_threshold: 0.5,
            turbidity_spike_percent: 50.0,
            temperature_delta_threshold: 5.0,
            combined_tier: Tier::Poor,
            combined_min_parameters: 2,
            sustained_tier: Tier::Poor,
            sustained_duration_ms: MS_PER_HOUR,
            grace_period_ms: 10 * MS_PER_MINUTE,
            confirm_ticks: 1,
            rearm_after_ms: 0,
            closed_history: 32,
        }
    }
}

impl DetectorConfig {
    pub fn with_grace_period_ms(mut self, grace_period_ms: u64) -> Self {
        self.grace_period_ms = grace_period_ms;
        self
    }

    pub fn with_confirm_ticks(mut self, confirm_ticks: u32) -> Self {
        self.confirm_ticks = confirm_ticks;
        self
    }

    pub fn with_rearm_after_ms(mut self, rearm_after_ms: u64) -> Self {
        self.rearm_after_ms = rearm_after_ms;
        self
    }

    pub fn with_sustained_duration_ms(mut self, sustained_duration_ms: u64) -> Self {
        self.sustained_duration_ms = sustained_duration_ms;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let thresholds = [
            self.ph_delta_threshold,
            self.turbidity_spike_percent,
            self.temperature_delta_threshold,
        ];
        if thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(ConfigError::Invalid("trigger thresholds must be positive"));
        }
        if self.combined_min_parameters == 0 || self.combined_min_parameters > PARAMETER_COUNT {
            return Err(ConfigError::Invalid(
                "combined degradation needs between 1 and 3 parameters",
            ));
        }
        if self.confirm_ticks == 0 {
            return Err(ConfigError::Invalid("confirm_ticks must be at least 1"));
        }
        Ok(())
    }
}

/// Per-type machine state
#[derive(Debug, Clone)]
enum Machine {
    Idle {
        pending: u32,
        closed_at: Option<Timestamp>,
    },
    Open(PollutionEvent),
}

impl Machine {
    const fn idle() -> Self {
        Machine::Idle {
            pending: 0,
            closed_at: None,
        }
    }
}

/// Pollution event detector
///
/// Owned by the single ingestion consumer; not thread-safe.
#[derive(Debug, Clone)]
pub struct EventDetector {
    config: DetectorConfig,
    machines: [Machine; EVENT_KIND_COUNT],
    /// Start of the current poor streak
    poor_since: Option<Timestamp>,
    recent: Deque<Reading, SNAPSHOT_CAPACITY>,
    closed: VecDeque<PollutionEvent>,
    next_id: EventId,
}

impl EventDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            machines: [
                Machine::idle(),
                Machine::idle(),
                Machine::idle(),
                Machine::idle(),
                Machine::idle(),
            ],
            poor_since: None,
            recent: Deque::new(),
            closed: VecDeque::with_capacity(config.closed_history),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluate one tick and return the resulting transitions
    ///
    /// `stats` must be the trend statistics computed from the same reading as
    /// `classification`.
    pub fn evaluate(
        &mut self,
        classification: &ClassificationResult,
        stats: &[TrendStat; PARAMETER_COUNT],
    ) -> Vec<EventTransition> {
        let now = classification.timestamp();

        if self.recent.is_full() {
            self.recent.pop_front();
        }
        let _ = self.recent.push_back(classification.reading);

        if classification.tier >= self.config.sustained_tier {
            self.poor_since.get_or_insert(now);
        } else {
            self.poor_since = None;
        }

        let mut transitions = Vec::new();
        for kind in EventKind::ALL {
            let qualifies = self.qualifies(kind, classification, stats);
            if let Some(transition) = self.step(kind, qualifies, classification, stats) {
                transitions.push(transition);
            }
        }
        transitions
    }

    fn qualifies(
        &self,
        kind: EventKind,
        classification: &ClassificationResult,
        stats: &[TrendStat; PARAMETER_COUNT],
    ) -> bool {
        let stat = |p: Parameter| &stats[p.index()];
        match kind {
            EventKind::RapidChange => stat(Parameter::Ph)
                .change
                .is_some_and(|c| c.delta.abs() > self.config.ph_delta_threshold),
            EventKind::Spike => stat(Parameter::Turbidity)
                .change
                .is_some_and(|c| c.percent_change > self.config.turbidity_spike_percent),
            EventKind::Anomaly => stat(Parameter::Temperature)
                .change
                .is_some_and(|c| c.delta.abs() > self.config.temperature_delta_threshold),
            EventKind::CombinedDegradation => {
                classification.count_at_least(self.config.combined_tier)
                    >= self.config.combined_min_parameters
            }
            EventKind::SustainedPoor => self.poor_since.is_some_and(|since| {
                elapsed_ms(since, classification.timestamp()) >= self.config.sustained_duration_ms
            }),
        }
    }

    fn step(
        &mut self,
        kind: EventKind,
        qualifies: bool,
        classification: &ClassificationResult,
        stats: &[TrendStat; PARAMETER_COUNT],
    ) -> Option<EventTransition> {
        let now = classification.timestamp();
        let tick_severity = if classification.tier == Tier::Critical {
            Severity::Critical
        } else {
            kind.base_severity()
        };

        match &mut self.machines[kind.index()] {
            Machine::Idle { pending, closed_at } => {
                let rearmed = closed_at
                    .map_or(true, |closed| elapsed_ms(closed, now) >= self.config.rearm_after_ms);
                if !qualifies || !rearmed {
                    *pending = 0;
                    return None;
                }

                *pending += 1;
                if *pending < self.config.confirm_ticks {
                    log::debug!("{} pending {}/{}", kind, pending, self.config.confirm_ticks);
                    return None;
                }

                let event = PollutionEvent {
                    id: self.next_id,
                    kind,
                    severity: tick_severity,
                    opened_at: now,
                    opened_wall_clock: classification.reading.wall_clock,
                    last_extended_at: now,
                    closed_at: None,
                    triggering_readings: self.snapshot(),
                    resolved: false,
                    description: describe(kind, classification, stats, &self.config, self.poor_since),
                };
                self.next_id += 1;

                log::info!("Event #{} opened: {} ({})", event.id, kind, event.description);
                self.machines[kind.index()] = Machine::Open(event.clone());
                Some(EventTransition {
                    kind: TransitionKind::Opened,
                    event,
                    at: now,
                    escalated: false,
                })
            }

            Machine::Open(event) if qualifies => {
                event.last_extended_at = now;
                let escalated = tick_severity > event.severity;
                if escalated {
                    log::info!("Event #{} escalated to {}", event.id, tick_severity);
                    event.severity = tick_severity;
                }
                Some(EventTransition {
                    kind: TransitionKind::Extended,
                    event: event.clone(),
                    at: now,
                    escalated,
                })
            }

            Machine::Open(event) => {
                if elapsed_ms(event.last_extended_at, now) < self.config.grace_period_ms {
                    return None;
                }

                let mut event = event.clone();
                event.closed_at = Some(now);
                event.resolved = true;
                log::info!(
                    "Event #{} closed: {} after {}s",
                    event.id,
                    kind,
                    event.duration_ms() / MS_PER_SECOND
                );

                self.machines[kind.index()] = Machine::Idle {
                    pending: 0,
                    closed_at: Some(now),
                };
                if self.config.closed_history > 0 {
                    if self.closed.len() >= self.config.closed_history {
                        self.closed.pop_front();
                    }
                    self.closed.push_back(event.clone());
                }

                Some(EventTransition {
                    kind: TransitionKind::Closed,
                    event,
                    at: now,
                    escalated: false,
                })
            }
        }
    }

    fn snapshot(&self) -> ReadingSnapshot {
        let mut snapshot = ReadingSnapshot::new();
        for reading in self.recent.iter() {
            // Same capacity as `recent`
            let _ = snapshot.push(*reading);
        }
        snapshot
    }

    /// State of one event type
    pub fn state(&self, kind: EventKind) -> EventState {
        match &self.machines[kind.index()] {
            Machine::Idle { pending, .. } => EventState::Idle { pending: *pending },
            Machine::Open(event) => EventState::Open { id: event.id },
        }
    }

    /// Open event of one type, if any
    pub fn open_event(&self, kind: EventKind) -> Option<&PollutionEvent> {
        match &self.machines[kind.index()] {
            Machine::Open(event) => Some(event),
            Machine::Idle { .. } => None,
        }
    }

    /// All currently open events in type order
    pub fn open_events(&self) -> impl Iterator<Item = &PollutionEvent> {
        EventKind::ALL.into_iter().filter_map(|kind| self.open_event(kind))
    }

    /// Recently closed events, oldest first
    pub fn closed_events(&self) -> impl Iterator<Item = &PollutionEvent> {
        self.closed.iter()
    }

    /// Start of the current poor streak
    pub fn poor_since(&self) -> Option<Timestamp> {
        self.poor_since
    }
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

fn describe(
    kind: EventKind,
    classification: &ClassificationResult,
    stats: &[TrendStat; PARAMETER_COUNT],
    config: &DetectorConfig,
    poor_since: Option<Timestamp>,
) -> String {
    let reading = &classification.reading;
    let mut text = String::new();

    let trend = |parameter: Parameter| {
        let stat = &stats[parameter.index()];
        (stat.change.map_or(0.0, |c| c.delta), stat.window_duration / MS_PER_SECOND)
    };

    // Writing into a String cannot fail
    let _ = match kind {
        EventKind::RapidChange => {
            let (delta, secs) = trend(Parameter::Ph);
            write!(
                text,
                "pH changed by {:+.2} within {}s (now {:.2})",
                delta, secs, reading.ph
            )
        }
        EventKind::Spike => {
            let stat = &stats[Parameter::Turbidity.index()];
            write!(
                text,
                "Turbidity rose {:.0}% within {}s (now {:.1} NTU)",
                stat.percent_change(),
                stat.window_duration / MS_PER_SECOND,
                reading.turbidity
            )
        }
        EventKind::Anomaly => {
            let (delta, secs) = trend(Parameter::Temperature);
            write!(
                text,
                "Temperature changed by {:+.1}°C within {}s (now {:.1}°C)",
                delta, secs, reading.temperature
            )
        }
        EventKind::CombinedDegradation => {
            let degraded: Vec<String> = classification
                .parameters
                .iter()
                .filter(|p| p.tier >= config.combined_tier)
                .map(|p| format!("{} {:.2}{} ({})", p.parameter, p.value, p.parameter.unit(), p.tier))
                .collect();
            write!(
                text,
                "{} parameters at {} or worse: {}",
                degraded.len(),
                config.combined_tier,
                degraded.join(", ")
            )
        }
        EventKind::SustainedPoor => {
            let minutes = poor_since.map_or(0, |since| {
                elapsed_ms(since, classification.timestamp()) / MS_PER_MINUTE
            });
            write!(
                text,
                "Water quality {} or worse for {} min (now {})",
                config.sustained_tier, minutes, classification.tier
            )
        }
    };
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::thresholds::ThresholdTable;
    use crate::trend::TrendWindow;

    struct Harness {
        table: ThresholdTable,
        trend: TrendWindow,
        detector: EventDetector,
    }

    impl Harness {
        fn new(config: DetectorConfig) -> Self {
            Self {
                table: ThresholdTable::default(),
                trend: TrendWindow::default(),
                detector: EventDetector::new(config),
            }
        }

        fn tick(&mut self, t_s: u64, ph: f32, turbidity: f32, temperature: f32) -> Vec<EventTransition> {
            let reading = Reading::new(t_s * MS_PER_SECOND, ph, turbidity, temperature);
            let classification = classify(&reading, &self.table);
            let stats = self.trend.update(&reading);
            self.detector.evaluate(&classification, &stats)
        }
    }

    fn kinds(transitions: &[EventTransition]) -> Vec<(EventKind, TransitionKind)> {
        transitions.iter().map(|t| (t.event.kind, t.kind)).collect()
    }

    #[test]
    fn rapid_change_opens_once() {
        let mut h = Harness::new(DetectorConfig::default());
        assert!(h.tick(0, 7.0, 2.0, 20.0).is_empty());

        let opened = h.tick(300, 7.6, 2.0, 20.0);
        assert_eq!(kinds(&opened), vec![(EventKind::RapidChange, TransitionKind::Opened)]);
        assert_eq!(opened[0].event.opened_at, 300 * MS_PER_SECOND);
        assert_eq!(opened[0].event.severity, Severity::Warning);
        assert_eq!(opened[0].event.triggering_readings.len(), 2);

        let extended = h.tick(310, 7.6, 2.0, 20.0);
        assert_eq!(kinds(&extended), vec![(EventKind::RapidChange, TransitionKind::Extended)]);
        assert_eq!(extended[0].event.id, opened[0].event.id);
    }

    #[test]
    fn insufficient_data_never_triggers() {
        let mut h = Harness::new(DetectorConfig::default());
        // Wild first reading, nothing to compare against
        assert!(h.tick(0, 9.2, 20.0, 33.0).is_empty());
        assert_eq!(h.detector.state(EventKind::RapidChange), EventState::Idle { pending: 0 });
    }

    #[test]
    fn closes_after_grace_period() {
        let config = DetectorConfig::default().with_grace_period_ms(60 * MS_PER_SECOND);
        let mut h = Harness::new(config);
        h.tick(0, 7.0, 2.0, 20.0);
        h.tick(10, 7.6, 2.0, 20.0);

        // Still qualifies while 7.0 is in the window
        let mut t = 20;
        while t < 600 {
            h.tick(t, 7.6, 2.0, 20.0);
            t += 10;
        }
        let event = h.detector.open_event(EventKind::RapidChange).unwrap().clone();

        // 7.0 drops out at 610s, grace runs from the last extension
        let mut closed = None;
        while closed.is_none() && t < 2000 {
            closed = h
                .tick(t, 7.6, 2.0, 20.0)
                .into_iter()
                .find(|tr| tr.kind == TransitionKind::Closed);
            t += 10;
        }
        let closed = closed.unwrap();
        assert_eq!(closed.event.id, event.id);
        assert!(closed.event.resolved);
        let closed_at = closed.event.closed_at.unwrap();
        assert!(closed_at - closed.event.last_extended_at >= 60 * MS_PER_SECOND);
        assert_eq!(h.detector.closed_events().count(), 1);
        assert!(h.detector.open_events().next().is_none());
    }

    #[test]
    fn confirm_ticks_debounce() {
        let config = DetectorConfig::default().with_confirm_ticks(2);
        let mut h = Harness::new(config);
        h.tick(0, 7.0, 2.0, 20.0);
        assert!(h.tick(10, 7.6, 2.0, 20.0).is_empty());
        assert_eq!(h.detector.state(EventKind::RapidChange), EventState::Idle { pending: 1 });

        let opened = h.tick(20, 7.6, 2.0, 20.0);
        assert_eq!(kinds(&opened), vec![(EventKind::RapidChange, TransitionKind::Opened)]);
    }

    #[test]
    fn combined_degradation_is_critical_and_independent() {
        let mut h = Harness::new(DetectorConfig::default());
        let opened = h.tick(0, 5.2, 50.0, 20.0);
        assert_eq!(
            kinds(&opened),
            vec![(EventKind::CombinedDegradation, TransitionKind::Opened)]
        );
        assert_eq!(opened[0].event.severity, Severity::Critical);
        assert!(opened[0].event.description.contains("2 parameters"));
    }

    #[test]
    fn escalates_but_never_deescalates() {
        let mut h = Harness::new(DetectorConfig::default());
        h.tick(0, 7.0, 2.0, 20.0);
        h.tick(10, 7.6, 2.0, 20.0);

        // Turbidity critical while pH still qualifies
        let escalated = h.tick(20, 7.6, 150.0, 20.0);
        let rapid = escalated
            .iter()
            .find(|t| t.event.kind == EventKind::RapidChange)
            .unwrap();
        assert!(rapid.escalated);
        assert_eq!(rapid.event.severity, Severity::Critical);

        let calm = h.tick(30, 7.6, 2.0, 20.0);
        let rapid = calm
            .iter()
            .find(|t| t.event.kind == EventKind::RapidChange)
            .unwrap();
        assert!(!rapid.escalated);
        assert_eq!(rapid.event.severity, Severity::Critical);
    }

    #[test]
    fn rearm_blocks_immediate_reopen() {
        let config = DetectorConfig::default()
            .with_grace_period_ms(0)
            .with_rearm_after_ms(60 * MS_PER_SECOND);
        let mut h = Harness::new(config);
        assert_eq!(h.tick(0, 5.2, 50.0, 20.0).len(), 1);
        // Degradation clears, grace of zero closes immediately
        let closed = h.tick(10, 7.0, 2.0, 20.0);
        assert!(kinds(&closed).contains(&(EventKind::CombinedDegradation, TransitionKind::Closed)));

        assert!(h.tick(20, 5.2, 50.0, 20.0)
            .iter()
            .all(|t| t.event.kind != EventKind::CombinedDegradation));
        let reopened = h.tick(80, 5.2, 50.0, 20.0);
        assert!(reopened
            .iter()
            .any(|t| t.event.kind == EventKind::CombinedDegradation && t.kind == TransitionKind::Opened));
    }

    #[test]
    fn ids_are_sequential() {
        let mut h = Harness::new(DetectorConfig::default());
        h.tick(0, 7.0, 4.0, 20.0);
        let opened = h.tick(10, 7.6, 7.0, 26.0);
        let ids: Vec<EventId> = opened.iter().map(|t| t.event.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn invalid_config() {
        let config = DetectorConfig {
            confirm_ticks: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(DetectorConfig::default().validate().is_ok());
    }
}
