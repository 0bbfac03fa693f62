//! Trend Window: per-parameter rate-of-change over a sliding horizon
//!
//! Every accepted reading is pushed into one [`HorizonBuffer`] per parameter.
//! After lazy eviction the window yields one [`TrendStat`] per parameter:
//!
//! - `delta` = newest value − earliest in-window value
//! - `percent_change` = 100 · delta / max(earliest value, epsilon)
//! - `direction` from the sign of `delta`
//!
//! Fewer than two samples in the window means there is nothing to compare.
//! The stat then carries no change at all, and the detector treats it as
//! non-triggering.

use serde::{Deserialize, Serialize};

use crate::buffer::{HorizonBuffer, Sample};
use crate::errors::{ConfigError, ConfigResult};
use crate::reading::{Parameter, Reading, PARAMETER_COUNT};
use crate::time::{Timestamp, MS_PER_MINUTE};

/// Maximum samples held per parameter
///
/// 10 minutes at a 10 second cadence needs 60; the headroom covers faster
/// cadences and longer horizons before the capacity bound kicks in.
pub const WINDOW_CAPACITY: usize = 256;

/// Deltas smaller than this count as no movement
pub const STEADY_EPSILON: f32 = 1e-6;

/// Default percent-change denominator floor
pub const DEFAULT_PERCENT_FLOOR: f32 = 1e-3;

/// Trend window configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// pH horizon in milliseconds
    pub ph_horizon_ms: u64,
    /// Turbidity horizon in milliseconds
    pub turbidity_horizon_ms: u64,
    /// Temperature horizon in milliseconds
    pub temperature_horizon_ms: u64,
    /// Lower bound on the percent-change denominator
    ///
    /// Only guards the division against a zero baseline. Raising it damps
    /// percent changes for every baseline below it.
    pub percent_floor: f32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            ph_horizon_ms: 10 * MS_PER_MINUTE,
            turbidity_horizon_ms: 10 * MS_PER_MINUTE,
            temperature_horizon_ms: 10 * MS_PER_MINUTE,
            percent_floor: DEFAULT_PERCENT_FLOOR,
        }
    }
}

impl TrendConfig {
    /// Same horizon for every parameter
    pub fn with_horizon_ms(mut self, horizon_ms: u64) -> Self {
        self.ph_horizon_ms = horizon_ms;
        self.turbidity_horizon_ms = horizon_ms;
        self.temperature_horizon_ms = horizon_ms;
        self
    }

    pub fn horizon_ms(&self, parameter: Parameter) -> u64 {
        match parameter {
            Parameter::Ph => self.ph_horizon_ms,
            Parameter::Turbidity => self.turbidity_horizon_ms,
            Parameter::Temperature => self.temperature_horizon_ms,
        }
    }

    /// Longest configured horizon
    pub fn max_horizon_ms(&self) -> u64 {
        Parameter::ALL
            .iter()
            .map(|p| self.horizon_ms(*p))
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if Parameter::ALL.iter().any(|p| self.horizon_ms(*p) == 0) {
            return Err(ConfigError::Invalid("trend horizon must be non-zero"));
        }
        if !self.percent_floor.is_finite() || self.percent_floor <= 0.0 {
            return Err(ConfigError::Invalid("percent floor must be positive"));
        }
        Ok(())
    }
}

/// Direction of movement across the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Rising,
    Falling,
    Steady,
}

/// Change between the earliest and newest in-window values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendChange {
    pub delta: f32,
    pub percent_change: f32,
    pub direction: Direction,
}

/// Trend statistic for one parameter, superseded every tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendStat {
    pub parameter: Parameter,
    /// Span between earliest and newest in-window sample
    pub window_duration: u64,
    /// Samples currently in the window
    pub samples: usize,
    /// `None` when the window holds fewer than two samples
    pub change: Option<TrendChange>,
}

impl TrendStat {
    /// Whether there was enough data to compute a change
    pub fn is_sufficient(&self) -> bool {
        self.change.is_some()
    }

    /// Absolute delta, zero on insufficient data
    pub fn abs_delta(&self) -> f32 {
        self.change.map_or(0.0, |c| c.delta.abs())
    }

    /// Percent change, zero on insufficient data
    pub fn percent_change(&self) -> f32 {
        self.change.map_or(0.0, |c| c.percent_change)
    }
}

/// Descriptive statistics over the in-window samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub parameter: Parameter,
    pub current: f32,
    pub average: f32,
    pub min: f32,
    pub max: f32,
    pub samples: usize,
}

/// Sliding windows for every parameter
#[derive(Debug, Clone)]
pub struct TrendWindow {
    config: TrendConfig,
    windows: [HorizonBuffer<WINDOW_CAPACITY>; PARAMETER_COUNT],
}

impl TrendWindow {
    pub fn new(config: TrendConfig) -> Self {
        Self {
            config,
            windows: Default::default(),
        }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Push a reading and recompute every parameter's stat
    pub fn update(&mut self, reading: &Reading) -> [TrendStat; PARAMETER_COUNT] {
        Parameter::ALL.map(|parameter| {
            let horizon = self.config.horizon_ms(parameter);
            let window = &mut self.windows[parameter.index()];
            window.push(
                Sample {
                    value: reading.value(parameter),
                    timestamp: reading.timestamp,
                },
                horizon,
            );
            self.stat(parameter)
        })
    }

    /// Current stat for one parameter without pushing
    pub fn stat(&self, parameter: Parameter) -> TrendStat {
        let window = &self.windows[parameter.index()];
        let samples = window.len();

        let (Some(earliest), Some(newest)) = (window.first(), window.last()) else {
            return TrendStat {
                parameter,
                window_duration: 0,
                samples,
                change: None,
            };
        };

        let window_duration = newest.timestamp.saturating_sub(earliest.timestamp);
        let change = (samples >= 2).then(|| {
            let delta = newest.value - earliest.value;
            let direction = if delta > STEADY_EPSILON {
                Direction::Rising
            } else if delta < -STEADY_EPSILON {
                Direction::Falling
            } else {
                Direction::Steady
            };
            TrendChange {
                delta,
                percent_change: 100.0 * delta / earliest.value.max(self.config.percent_floor),
                direction,
            }
        });

        TrendStat {
            parameter,
            window_duration,
            samples,
            change,
        }
    }

    /// Current/average/min/max over the in-window samples
    pub fn summary(&self, parameter: Parameter) -> Option<ParameterSummary> {
        let window = &self.windows[parameter.index()];
        let current = window.last()?.value;

        let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f32);
        for sample in window.iter() {
            min = min.min(sample.value);
            max = max.max(sample.value);
            sum += sample.value;
        }

        Some(ParameterSummary {
            parameter,
            current,
            average: sum / window.len() as f32,
            min,
            max,
            samples: window.len(),
        })
    }

    /// Samples dropped because a window hit capacity before its horizon
    ///
    /// Non-zero means readings arrive faster than the capacity can cover,
    /// so the effective horizon is shorter than configured.
    pub fn overwritten(&self) -> u64 {
        self.windows.iter().map(|w| w.overwritten()).sum()
    }

    /// Timestamp of the newest sample, if any
    pub fn newest(&self) -> Option<Timestamp> {
        self.windows[0].last().map(|s| s.timestamp)
    }
}

impl Default for TrendWindow {
    fn default() -> Self {
        Self::new(TrendConfig::default())
    }
}
