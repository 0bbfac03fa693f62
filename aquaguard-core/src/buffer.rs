//! Fixed-Capacity Time-Horizon Buffer for Trend Tracking
//!
//! ## Overview
//!
//! Trend statistics compare the newest value against the earliest value that
//! is still inside a sliding time horizon. This buffer keeps exactly those
//! samples, in arrival order, without ever growing past a compile-time
//! capacity.
//!
//! ## Eviction
//!
//! Two rules bound the buffer:
//!
//! 1. **Horizon**: samples older than `now - horizon` are dropped lazily on
//!    each push, before statistics are computed.
//! 2. **Capacity**: if the cadence is faster than expected and the buffer is
//!    full, the oldest sample is overwritten. Recent data is worth more than
//!    old data.
//!
//! ```text
//!            horizon
//!       ├──────────────────┤
//!  ─ ─ ×──×──┼──●──●──●──●──●  now
//!   evicted  │  kept
//! ```
//!
//! With the default 10 minute horizon and 10 second cadence the window holds
//! about 60 samples, so every push costs O(window) in the worst case and O(1)
//! amortised.
//!
//! ## Usage Example
//!
//! ```rust
//! use aquaguard_core::buffer::{HorizonBuffer, Sample};
//!
//! let mut window: HorizonBuffer<8> = HorizonBuffer::new();
//! window.push(Sample { value: 7.0, timestamp: 0 }, 600_000);
//! window.push(Sample { value: 7.6, timestamp: 300_000 }, 600_000);
//!
//! let first = window.first().unwrap();
//! let last = window.last().unwrap();
//! assert!((last.value - first.value - 0.6).abs() < 1e-6);
//! ```

use heapless::Deque;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Single value with timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f32,
    pub timestamp: Timestamp,
}

/// Time-bounded ring buffer of samples
///
/// ## Internal Invariants
///
/// - Samples are stored oldest first with non-decreasing timestamps
/// - `len() <= N`
/// - After `push(sample, horizon)` every sample satisfies
///   `sample.timestamp + horizon >= newest.timestamp`
///
/// ## Thread Safety
///
/// Not thread-safe. Each trend window is owned by the single ingestion
/// consumer.
#[derive(Debug, Clone)]
pub struct HorizonBuffer<const N: usize> {
    samples: Deque<Sample, N>,
    overwritten: u64,
}

impl<const N: usize> HorizonBuffer<N> {
    /// Creates a new empty buffer
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
            overwritten: 0,
        }
    }

    /// Appends a sample and evicts everything older than the horizon
    ///
    /// A sample exactly `horizon` ms older than the new one stays in.
    pub fn push(&mut self, sample: Sample, horizon: u64) {
        self.evict_before(sample.timestamp.saturating_sub(horizon));

        if self.samples.is_full() {
            self.samples.pop_front();
            self.overwritten += 1;
        }

        // Cannot fail: a slot was freed above if the deque was full
        let _ = self.samples.push_back(sample);
    }

    /// Drops samples stamped strictly before `cutoff`
    pub fn evict_before(&mut self, cutoff: Timestamp) {
        while let Some(oldest) = self.samples.front() {
            if oldest.timestamp >= cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    /// Earliest in-window sample
    pub fn first(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Samples lost to the capacity bound rather than the horizon
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<const N: usize> Default for HorizonBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
