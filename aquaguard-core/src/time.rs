//! Time management for the ingestion pipeline
//!
//! Readings carry two clocks:
//! - Monotonic milliseconds, used for every window, streak and cooldown rule
//! - Wall clock, used only for display and storage
//!
//! Nothing in the engine reads the system clock on its own. Time only moves
//! when a reading arrives, which keeps replays deterministic.

use std::time::Instant;

use chrono::{DateTime, Utc};

/// Timestamp in milliseconds on the monotonic axis
pub type Timestamp = u64;

/// Milliseconds per second
pub const MS_PER_SECOND: u64 = 1_000;

/// Milliseconds per minute
pub const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;

/// Milliseconds per hour
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Source of time for stamping readings
pub trait TimeSource {
    /// Monotonic timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Wall-clock time matching `now()`
    fn wall_clock(&self) -> DateTime<Utc>;
}

/// Monotonic clock anchored at construction
///
/// Starts at 0 and always increases, regardless of wall-clock adjustments.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed time source for testing
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        // Monotonic axis mapped onto the Unix epoch
        DateTime::from_timestamp_millis(self.timestamp as i64).unwrap_or_default()
    }
}

/// Elapsed milliseconds between two timestamps, zero if they are reversed
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}
