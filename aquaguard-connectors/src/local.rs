//! Local buzzer and LED channel
//!
//! Maps severity to an LED colour and a buzzer pattern on the station
//! itself. Resolution notices turn the LED green and stay silent.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use aquaguard_core::{AlertChannel, ChannelError, Notification, Severity};

use crate::{ChannelStats, StatsCell};

/// Status LED colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColour {
    Red,
    Yellow,
    Blue,
    Green,
}

impl LedColour {
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => LedColour::Red,
            Severity::Warning => LedColour::Yellow,
            Severity::Info => LedColour::Blue,
        }
    }
}

impl core::fmt::Display for LedColour {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            LedColour::Red => "red",
            LedColour::Yellow => "yellow",
            LedColour::Blue => "blue",
            LedColour::Green => "green",
        })
    }
}

/// `count` beeps of `duration` each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuzzerPattern {
    pub duration: Duration,
    pub count: u8,
}

impl BuzzerPattern {
    pub const fn new(duration_ms: u64, count: u8) -> Self {
        Self {
            duration: Duration::from_millis(duration_ms),
            count,
        }
    }

    pub const fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::new(500, 3),
            Severity::Warning => Self::new(200, 2),
            Severity::Info => Self::new(100, 1),
        }
    }
}

/// Station indicator hardware
#[async_trait]
pub trait Indicator: Send + Sync {
    fn set_led(&self, colour: LedColour) -> Result<(), ChannelError>;

    /// Play a pattern; may take as long as the pattern lasts
    async fn beep(&self, pattern: BuzzerPattern) -> Result<(), ChannelError>;
}

/// Local channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub led_enabled: bool,
    pub buzzer_enabled: bool,
    pub min_severity: Severity,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            led_enabled: true,
            buzzer_enabled: true,
            min_severity: Severity::Info,
        }
    }
}

/// Buzzer/LED alerts through an [`Indicator`]
pub struct LocalChannel<I> {
    config: LocalConfig,
    indicator: I,
    stats: StatsCell,
}

impl<I: Indicator> LocalChannel<I> {
    pub fn new(config: LocalConfig, indicator: I) -> Self {
        Self {
            config,
            indicator,
            stats: StatsCell::default(),
        }
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }

    async fn signal(&self, notification: &Notification) -> Result<(), ChannelError> {
        if notification.is_resolution() {
            if self.config.led_enabled {
                self.indicator.set_led(LedColour::Green)?;
            }
            return Ok(());
        }

        if self.config.led_enabled {
            self.indicator.set_led(LedColour::for_severity(notification.severity))?;
        }
        if self.config.buzzer_enabled {
            self.indicator
                .beep(BuzzerPattern::for_severity(notification.severity))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<I: Indicator> AlertChannel for LocalChannel<I> {
    fn name(&self) -> &str {
        "local"
    }

    fn is_enabled(&self) -> bool {
        self.config.led_enabled || self.config.buzzer_enabled
    }

    fn min_severity(&self) -> Severity {
        self.config.min_severity
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        if !self.is_enabled() {
            return Err(ChannelError::Disabled);
        }
        debug!(
            "Local indicator for event #{} ({})",
            notification.event_id, notification.severity
        );
        let result = self.signal(notification).await;
        self.stats.record(result)
    }
}
