//! Calibrated water-quality readings and their physical limits
//!
//! A `Reading` is produced by the sensor collaborator once per cadence tick
//! (10s by default) and is immutable afterwards. Calibration has already been
//! applied: values are in physical units.
//!
//! ## Physical Limits
//!
//! Before a reading reaches the classifier it must pass a sanity gate:
//! - **pH**: the scale itself is 0-14
//! - **Turbidity**: non-negative, capped at what optical sensors can report
//! - **Temperature**: liquid water range with margin for supercooling
//!
//! A reading failing the gate is rejected as a whole. Classifying the other
//! two parameters of a half-broken sample would let a sensor fault look like
//! a pollution event.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{IngestError, IngestResult};
use crate::time::{TimeSource, Timestamp};

/// Number of tracked parameters
pub const PARAMETER_COUNT: usize = 3;

/// Measured water parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Acidity on the 0-14 pH scale
    Ph,
    /// Optical turbidity in NTU
    Turbidity,
    /// Water temperature in °C
    Temperature,
}

impl Parameter {
    /// All parameters in canonical order
    pub const ALL: [Parameter; PARAMETER_COUNT] =
        [Parameter::Ph, Parameter::Turbidity, Parameter::Temperature];

    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Parameter::Ph => "pH",
            Parameter::Turbidity => "turbidity",
            Parameter::Temperature => "temperature",
        }
    }

    /// Get expected unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            Parameter::Ph => "",
            Parameter::Turbidity => "NTU",
            Parameter::Temperature => "°C",
        }
    }

    /// Position in per-parameter arrays
    pub const fn index(&self) -> usize {
        match self {
            Parameter::Ph => 0,
            Parameter::Turbidity => 1,
            Parameter::Temperature => 2,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One calibrated sample of all three parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Monotonic timestamp in milliseconds
    pub timestamp: Timestamp,
    /// Wall-clock time of the sample
    pub wall_clock: DateTime<Utc>,
    /// pH, 0-14
    pub ph: f32,
    /// Turbidity in NTU
    pub turbidity: f32,
    /// Temperature in °C
    pub temperature: f32,
}

impl Reading {
    /// Build a reading with an explicit timestamp
    ///
    /// The wall clock is derived from the monotonic timestamp; use
    /// [`Reading::sample`] when a real clock is available.
    pub fn new(timestamp: Timestamp, ph: f32, turbidity: f32, temperature: f32) -> Self {
        Self {
            timestamp,
            wall_clock: DateTime::from_timestamp_millis(timestamp as i64).unwrap_or_default(),
            ph,
            turbidity,
            temperature,
        }
    }

    /// Stamp a reading from a time source
    pub fn sample(clock: &dyn TimeSource, ph: f32, turbidity: f32, temperature: f32) -> Self {
        Self {
            timestamp: clock.now(),
            wall_clock: clock.wall_clock(),
            ph,
            turbidity,
            temperature,
        }
    }

    /// Value of one parameter
    pub fn value(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::Ph => self.ph,
            Parameter::Turbidity => self.turbidity,
            Parameter::Temperature => self.temperature,
        }
    }
}

/// Inclusive physical range for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Physical limits applied at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalLimits {
    pub ph: Range,
    pub turbidity: Range,
    pub temperature: Range,
}

impl Default for PhysicalLimits {
    fn default() -> Self {
        Self {
            ph: Range::new(0.0, 14.0),
            // Optical sensors saturate well below this
            turbidity: Range::new(0.0, 4000.0),
            // Supercooled surface water to boiling
            temperature: Range::new(-10.0, 100.0),
        }
    }
}

impl PhysicalLimits {
    /// Range configured for one parameter
    pub fn range(&self, parameter: Parameter) -> Range {
        match parameter {
            Parameter::Ph => self.ph,
            Parameter::Turbidity => self.turbidity,
            Parameter::Temperature => self.temperature,
        }
    }

    /// Reject readings that are not finite or not physically possible
    pub fn check(&self, reading: &Reading) -> IngestResult<()> {
        for parameter in Parameter::ALL {
            let value = reading.value(parameter);
            if !value.is_finite() {
                return Err(IngestError::InvalidValue { parameter });
            }

            let range = self.range(parameter);
            if !range.contains(value) {
                return Err(IngestError::OutOfRange {
                    parameter,
                    value,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedTime;

    #[test]
    fn accepts_normal_reading() {
        let limits = PhysicalLimits::default();
        assert!(limits.check(&Reading::new(0, 7.2, 3.5, 20.0)).is_ok());
    }

    #[test]
    fn rejects_impossible_ph() {
        let limits = PhysicalLimits::default();
        let result = limits.check(&Reading::new(0, 15.0, 3.5, 20.0));
        assert!(matches!(
            result,
            Err(IngestError::OutOfRange { parameter: Parameter::Ph, .. })
        ));
    }

    #[test]
    fn rejects_negative_turbidity() {
        let limits = PhysicalLimits::default();
        assert!(limits.check(&Reading::new(0, 7.0, -0.1, 20.0)).is_err());
    }

    #[test]
    fn rejects_nan() {
        let limits = PhysicalLimits::default();
        let result = limits.check(&Reading::new(0, 7.0, 3.0, f32::NAN));
        assert_eq!(
            result,
            Err(IngestError::InvalidValue { parameter: Parameter::Temperature })
        );
    }

    #[test]
    fn sample_uses_time_source() {
        let clock = FixedTime::new(42_000);
        let reading = Reading::sample(&clock, 7.0, 1.0, 18.0);
        assert_eq!(reading.timestamp, 42_000);
        assert_eq!(reading.wall_clock.timestamp(), 42);
        assert_eq!(reading.value(Parameter::Turbidity), 1.0);
    }
}
