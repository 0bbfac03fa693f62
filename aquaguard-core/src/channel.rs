//! Alert channel capability
//!
//! The dispatcher is polymorphic over [`AlertChannel`]. Adapters for email,
//! SMS, buzzer/LED or webhooks live in `aquaguard-connectors` and only know
//! how to render and hand over a [`Notification`]; when and to whom to alert
//! is decided here in the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detector::{EventId, EventKind, EventTransition, Severity, TransitionKind};
use crate::errors::ChannelError;
use crate::reading::Reading;
use crate::thresholds::Tier;
use crate::time::{Timestamp, MS_PER_MINUTE};

/// Message handed to every channel adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event_id: EventId,
    pub event_kind: EventKind,
    pub transition: TransitionKind,
    pub severity: Severity,
    /// Severity rose on the tick that produced this notification
    pub escalated: bool,
    /// Overall tier of the tick that produced this notification
    pub tier: Tier,
    /// Reading of that tick
    pub reading: Reading,
    /// Monotonic timestamp of that tick
    pub at: Timestamp,
    pub wall_clock: DateTime<Utc>,
    /// One-line human-readable text
    pub message: String,
}

impl Notification {
    /// Build the notification for one event transition
    pub fn from_transition(transition: &EventTransition, tier: Tier, reading: Reading) -> Self {
        let event = &transition.event;
        let message = match transition.kind {
            TransitionKind::Opened => event.description.clone(),
            TransitionKind::Extended if transition.escalated => {
                format!("Escalated to {}: {}", event.severity, event.description)
            }
            TransitionKind::Extended => format!("Ongoing: {}", event.description),
            TransitionKind::Closed => format!(
                "Resolved after {} min: {}",
                event.duration_ms() / MS_PER_MINUTE,
                event.description
            ),
        };

        Self {
            event_id: event.id,
            event_kind: event.kind,
            transition: transition.kind,
            severity: event.severity,
            escalated: transition.escalated,
            tier,
            reading,
            at: transition.at,
            wall_clock: reading.wall_clock,
            message,
        }
    }

    /// Whether this is a resolution notice
    pub fn is_resolution(&self) -> bool {
        self.transition == TransitionKind::Closed
    }
}

/// A destination for alerts
///
/// `send` is invoked on its own task with a per-attempt timeout and bounded
/// retries around it, so an implementation may block on I/O for as long as
/// its transport needs.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Stable channel name, used as the cooldown ledger key
    fn name(&self) -> &str;

    /// Whether the channel takes alerts at all
    fn is_enabled(&self) -> bool {
        true
    }

    /// Least severe alert this channel is opened for
    fn min_severity(&self) -> Severity {
        Severity::Info
    }

    /// Whether a new alert of this severity goes to this channel
    fn accepts(&self, severity: Severity) -> bool {
        self.is_enabled() && severity >= self.min_severity()
    }

    /// Deliver one notification
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}
