//! Error Types for Ingestion, Configuration and Delivery Failures
//!
//! ## Error Categories
//!
//! AquaGuard separates failures by who has to react to them:
//!
//! ### Ingestion
//! - `IngestError::NonMonotonic`: reading stamped at or before the last accepted one
//! - `IngestError::InvalidValue`: NaN or infinity from the sensor collaborator
//! - `IngestError::OutOfRange`: value outside what the physics allows (pH 15)
//!
//! A rejected reading leaves every piece of engine state untouched, so the
//! last valid classification stays in effect.
//!
//! ### Configuration
//! `ConfigError` is fatal at startup. The engine refuses to run with a
//! threshold table that has gaps or overlaps, because classification totality
//! depends on the bands partitioning the value axis.
//!
//! ### Delivery
//! `ChannelError` and `SinkError` are recovered locally. Channel failures are
//! retried and then recorded as `Failed` alert records, sink failures are
//! logged. Neither ever reaches the ingestion caller.
//!
//! ```rust
//! use aquaguard_core::{IngestError, Parameter};
//!
//! fn on_reject(err: IngestError) {
//!     match err {
//!         IngestError::NonMonotonic { .. } => { /* clock went backwards */ }
//!         IngestError::OutOfRange { parameter: Parameter::Ph, .. } => { /* sensor fault */ }
//!         _ => {}
//!     }
//! }
//! ```

use thiserror::Error;

use crate::reading::Parameter;
use crate::time::Timestamp;

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reasons a reading is rejected at the ingestion boundary
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum IngestError {
    /// Timestamp did not advance past the last accepted reading
    #[error("Non-monotonic timestamp {timestamp}ms (last accepted {last_accepted}ms)")]
    NonMonotonic {
        /// Timestamp of the rejected reading
        timestamp: Timestamp,
        /// Timestamp of the last reading that was accepted
        last_accepted: Timestamp,
    },

    /// Value is NaN or infinite
    #[error("Invalid {parameter} value: not a finite number")]
    InvalidValue {
        /// Offending parameter
        parameter: Parameter,
    },

    /// Value outside physical limits
    #[error("{parameter} value {value} outside physical range [{min}, {max}]")]
    OutOfRange {
        /// Offending parameter
        parameter: Parameter,
        /// The rejected value
        value: f32,
        /// Lowest accepted value
        min: f32,
        /// Highest accepted value
        max: f32,
    },
}

/// Invalid engine configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter has no bands at all
    #[error("No threshold bands configured for {0}")]
    EmptyBands(Parameter),

    /// A band bound is NaN/infinite or the band is empty
    #[error("Malformed {parameter} band [{low}, {high})")]
    MalformedBand {
        /// Parameter the band belongs to
        parameter: Parameter,
        /// Lower bound (inclusive)
        low: f32,
        /// Upper bound (exclusive)
        high: f32,
    },

    /// Consecutive bands leave part of the axis uncovered
    #[error("Gap in {parameter} bands between {high} and {next_low}")]
    GappedBands {
        /// Parameter the bands belong to
        parameter: Parameter,
        /// Upper bound of the earlier band
        high: f32,
        /// Lower bound of the following band
        next_low: f32,
    },

    /// Consecutive bands cover part of the axis twice
    #[error("Overlapping {parameter} bands: {next_low} starts before {high}")]
    OverlappingBands {
        /// Parameter the bands belong to
        parameter: Parameter,
        /// Upper bound of the earlier band
        high: f32,
        /// Lower bound of the following band
        next_low: f32,
    },

    /// Any other out-of-bounds tunable
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),

    /// Configuration document could not be decoded
    #[error("Configuration parse error: {0}")]
    Parse(String),
}

/// Failure delivering an alert on one channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Attempt exceeded the per-attempt timeout
    #[error("Send timed out after {0}ms")]
    Timeout(u64),

    /// Underlying transport reported a failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel is switched off or has no recipients
    #[error("Channel disabled")]
    Disabled,

    /// Alert could not be rendered for this channel
    #[error("Format error: {0}")]
    Format(String),
}

/// Failure persisting a record to the storage sink
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Sink cannot take more records right now
    #[error("Storage sink full")]
    Full,

    /// Backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}
