//! Alert Channel Adapters for AquaGuard
//!
//! ## Overview
//!
//! The core engine decides *when* an alert goes out and *to which* channels.
//! This crate supplies the channels: each adapter implements
//! [`aquaguard_core::AlertChannel`], renders a [`Notification`] into the
//! shape its medium wants, and hands it to a small transport trait that the
//! embedding process implements (an SMTP client, an SMS gateway, GPIO pins).
//!
//! ## Channel Selection Guide
//!
//! ### Email
//!
//! **Default routing:** Warning and Critical.
//! - Full report: severity, event type, time, message, water parameters and
//!   the tier assessment with recommended actions
//! - One message addressed to every configured recipient
//!
//! ### SMS
//!
//! **Default routing:** Critical only.
//! - One line, `"<SEVERITY>: <message>"`, cut to a single 160-character segment
//! - Sent to every configured number
//!
//! ### Local (buzzer/LED)
//!
//! **Default routing:** everything, including Info. Detected events are
//! never Info; that row applies to notices other producers submit to the
//! dispatcher directly.
//!
//! | Severity | LED    | Buzzer      |
//! |----------|--------|-------------|
//! | Critical | red    | 500ms × 3   |
//! | Warning  | yellow | 200ms × 2   |
//! | Info     | blue   | 100ms × 1   |
//! | resolved | green  | silent      |
//!
//! ### Webhook (feature `webhook`)
//!
//! JSON `POST` of the whole notification. The request runs on tokio's
//! blocking pool so the synchronous `ureq` client never stalls the runtime.
//!
//! ## Retry and Timeouts
//!
//! Adapters make exactly one delivery attempt per `send`. Retries with
//! exponential backoff and the per-attempt timeout are applied by the core
//! dispatcher around every adapter, so a channel never needs its own.
//!
//! ## Example Usage
//!
//! ```rust
//! use aquaguard_connectors::local::{BuzzerPattern, Indicator, LedColour, LocalChannel, LocalConfig};
//! use aquaguard_core::{ChannelError, Engine};
//!
//! struct Pins;
//!
//! #[async_trait::async_trait]
//! impl Indicator for Pins {
//!     fn set_led(&self, colour: LedColour) -> Result<(), ChannelError> {
//!         println!("LED {}", colour);
//!         Ok(())
//!     }
//!
//!     async fn beep(&self, pattern: BuzzerPattern) -> Result<(), ChannelError> {
//!         println!("beep {:?}", pattern);
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::builder()
//!     .channel(LocalChannel::new(LocalConfig::default(), Pins))
//!     .build()?;
//! # engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Mutex;

use aquaguard_core::{ChannelError, Notification};

pub mod email;
pub mod local;
pub mod sms;

#[cfg(feature = "webhook")]
pub mod webhook;

// Re-export common types
pub use email::{EmailChannel, EmailConfig, EmailMessage, MailTransport};
pub use local::{BuzzerPattern, Indicator, LedColour, LocalChannel, LocalConfig};
pub use sms::{SmsChannel, SmsConfig, SmsGateway, SMS_MAX_CHARS};

#[cfg(feature = "webhook")]
pub use webhook::{AuthMethod, WebhookChannel, WebhookConfig};

/// System name used in message subjects and headers
pub const DEFAULT_SYSTEM_NAME: &str = "AquaGuard";

/// Delivery statistics common to all adapters
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChannelStats {
    /// Notifications delivered
    pub sent: u64,
    /// Delivery attempts that failed
    pub failed: u64,
    /// Last error message
    pub last_error: Option<String>,
}

/// Shared counter cell behind each adapter's `stats()`
#[derive(Debug, Default)]
pub(crate) struct StatsCell(Mutex<ChannelStats>);

impl StatsCell {
    /// Count the outcome of one attempt and hand it back unchanged
    pub(crate) fn record(&self, result: Result<(), ChannelError>) -> Result<(), ChannelError> {
        let mut stats = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &result {
            Ok(()) => stats.sent += 1,
            Err(e) => {
                stats.failed += 1;
                stats.last_error = Some(e.to_string());
            }
        }
        result
    }

    pub(crate) fn snapshot(&self) -> ChannelStats {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Water parameters of the notifying tick, one per line
pub(crate) fn parameter_lines(notification: &Notification) -> String {
    let reading = &notification.reading;
    format!(
        "- pH: {:.2}\n- Turbidity: {:.1} NTU\n- Temperature: {:.1}°C",
        reading.ph, reading.turbidity, reading.temperature
    )
}
