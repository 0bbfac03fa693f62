//! Engine configuration
//!
//! Every tunable of the pipeline in one serde-friendly struct. Missing fields
//! take their defaults, so a deployment only spells out what it changes:
//!
//! ```rust
//! use aquaguard_core::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "latency_budget_ms": 20,
//!     "dispatcher": { "cooldown_ms": 900000 }
//! }"#).unwrap();
//!
//! assert_eq!(config.latency_budget_ms, 20);
//! assert_eq!(config.dispatcher.cooldown_ms, 900_000);
//! assert_eq!(config.dispatcher.max_retries, 3);
//! ```
//!
//! Reading the document from disk is the embedding process's job.

use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::dispatcher::DispatcherConfig;
use crate::errors::{ConfigError, ConfigResult};
use crate::reading::{Parameter, PhysicalLimits};
use crate::thresholds::ThresholdTable;
use crate::trend::TrendConfig;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: ThresholdTable,
    pub limits: PhysicalLimits,
    pub trend: TrendConfig,
    pub detector: DetectorConfig,
    pub dispatcher: DispatcherConfig,
    /// Ticks slower than this are logged
    pub latency_budget_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            limits: PhysicalLimits::default(),
            trend: TrendConfig::default(),
            detector: DetectorConfig::default(),
            dispatcher: DispatcherConfig::default(),
            latency_budget_ms: 50,
        }
    }
}

impl EngineConfig {
    /// Decode from JSON, then validate
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_trend(mut self, trend: TrendConfig) -> Self {
        self.trend = trend;
        self
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Check every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.thresholds.validate()?;
        for parameter in Parameter::ALL {
            let range = self.limits.range(parameter);
            if !(range.min.is_finite() && range.max.is_finite() && range.min < range.max) {
                return Err(ConfigError::Invalid("physical limits must be finite with min < max"));
            }
        }
        self.trend.validate()?;
        self.detector.validate()?;
        self.dispatcher.validate()?;
        if self.latency_budget_ms == 0 {
            return Err(ConfigError::Invalid("latency budget must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::{Band, Tier};

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "detector": { "confirm_ticks": 3 } }"#).unwrap();
        assert_eq!(config.detector.confirm_ticks, 3);
        assert_eq!(config.detector.ph_delta_threshold, 0.5);
        assert_eq!(config.thresholds, ThresholdTable::default());
    }

    #[test]
    fn json_round_trip() {
        let config = EngineConfig::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn gapped_bands_are_fatal() {
        let table = ThresholdTable::default().with_bands(
            Parameter::Turbidity,
            vec![Band::new(Tier::Excellent, 0.0, 5.0), Band::new(Tier::Good, 6.0, 10.0)],
        );
        let err = EngineConfig::default().with_thresholds(table).validate().unwrap_err();
        assert!(matches!(err, ConfigError::GappedBands { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
