//! Core monitoring engine for AquaGuard
//!
//! Classifies a periodic stream of calibrated water-quality readings (pH,
//! turbidity, temperature), detects pollution events from the shape of the
//! signal over time, and fans alerts out to channels without letting a slow
//! channel stall ingestion.
//!
//! Key constraints:
//! - One synchronous tick per reading, well inside a 50ms budget
//! - Bounded memory: fixed-capacity trend windows and event snapshots
//! - Deterministic: replaying the same readings reproduces the same events
//!
//! ```no_run
//! use aquaguard_core::{Engine, Reading};
//!
//! let mut engine = Engine::builder().build()?;
//!
//! engine.submit_reading(Reading::new(0, 7.0, 4.0, 20.0))?;
//! engine.submit_reading(Reading::new(300_000, 7.6, 4.0, 20.0))?;
//!
//! for event in engine.read_model().open_events() {
//!     println!("#{} {}: {}", event.id, event.kind, event.description);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod buffer;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod read_model;
pub mod reading;
pub mod sink;
pub mod thresholds;
pub mod time;
pub mod trend;

// Public API
pub use channel::{AlertChannel, Notification};
pub use classifier::{classify, ClassificationResult, Classifier, ParameterClass};
pub use config::EngineConfig;
pub use detector::{
    DetectorConfig, EventDetector, EventId, EventKind, EventState, EventTransition, PollutionEvent,
    Severity, TransitionKind,
};
pub use dispatcher::{AlertDispatcher, AlertLog, AlertOutcome, AlertRecord, DispatcherConfig, DispatcherHandle};
pub use engine::{Engine, EngineBuilder, TickReport};
pub use errors::{ChannelError, ConfigError, ConfigResult, IngestError, IngestResult, SinkError};
pub use read_model::{Counters, ReadModel, Snapshot};
pub use reading::{Parameter, PhysicalLimits, Range, Reading};
pub use sink::{MemorySink, NullSink, StorageSink};
pub use thresholds::{Band, ThresholdTable, Tier};
pub use time::{FixedTime, MonotonicClock, TimeSource, Timestamp};
pub use trend::{Direction, ParameterSummary, TrendChange, TrendConfig, TrendStat, TrendWindow};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
