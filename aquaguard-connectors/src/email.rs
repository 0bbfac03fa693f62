//! Email alert channel
//!
//! Renders a plain-text report and hands it to a [`MailTransport`]. The
//! transport owns SMTP (or any relay API), credentials and TLS; this adapter
//! only decides what the message says and who it is addressed to.
//!
//! ```text
//! Subject: AquaGuard Alert: CRITICAL
//!
//! AquaGuard Water Quality Alert
//!
//! SEVERITY: CRITICAL
//! TYPE: combined_degradation
//! TIME: 2024-05-01 14:03:20 UTC
//!
//! MESSAGE:
//! 2 parameters at Poor or worse (pH Poor, turbidity Poor)
//!
//! WATER PARAMETERS:
//! - pH: 5.20
//! - Turbidity: 50.0 NTU
//! - Temperature: 20.0°C
//!
//! ASSESSMENT (poor):
//! Water quality is poor. Not recommended for sensitive uses. ...
//! - Immediately increase monitoring frequency
//! - Investigate pollution sources
//! ...
//! ```

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use aquaguard_core::{AlertChannel, ChannelError, Notification, Severity};

use crate::{parameter_lines, ChannelStats, StatsCell, DEFAULT_SYSTEM_NAME};

/// A rendered email ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Outbound mail capability supplied by the embedding process
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message to all of its recipients
    async fn deliver(&self, message: &EmailMessage) -> Result<(), ChannelError>;
}

/// Email channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    /// Name in the subject line and report header
    pub system_name: String,
    /// Sender address
    pub from: String,
    pub recipients: Vec<String>,
    pub min_severity: Severity,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            system_name: DEFAULT_SYSTEM_NAME.into(),
            from: String::new(),
            recipients: Vec::new(),
            min_severity: Severity::Warning,
        }
    }
}

impl EmailConfig {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    /// Add a recipient
    pub fn recipient(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn system_name(mut self, name: impl Into<String>) -> Self {
        self.system_name = name.into();
        self
    }
}

/// Email alerts through a [`MailTransport`]
pub struct EmailChannel<T> {
    config: EmailConfig,
    transport: T,
    stats: StatsCell,
}

impl<T: MailTransport> EmailChannel<T> {
    pub fn new(config: EmailConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            stats: StatsCell::default(),
        }
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }

    /// Render the message for one notification
    pub fn render(&self, notification: &Notification) -> EmailMessage {
        let system = &self.config.system_name;
        let body = format!(
            "{system} Water Quality Alert\n\n\
             SEVERITY: {severity}\n\
             TYPE: {kind}\n\
             TIME: {time}\n\n\
             MESSAGE:\n{message}\n\n\
             WATER PARAMETERS:\n{parameters}\n\n\
             ASSESSMENT ({tier}):\n{description}\n{recommendations}\n\n\
             ---\n{system} Monitoring System\n",
            system = system,
            severity = notification.severity.label(),
            kind = notification.event_kind,
            time = notification.wall_clock.format("%Y-%m-%d %H:%M:%S UTC"),
            message = notification.message,
            parameters = parameter_lines(notification),
            tier = notification.tier,
            description = notification.tier.description(),
            recommendations = notification
                .tier
                .recommendations()
                .iter()
                .map(|r| format!("- {}", r))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        EmailMessage {
            from: self.config.from.clone(),
            to: self.config.recipients.clone(),
            subject: format!("{} Alert: {}", system, notification.severity.label()),
            body,
        }
    }
}

#[async_trait]
impl<T: MailTransport> AlertChannel for EmailChannel<T> {
    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.recipients.is_empty()
    }

    fn min_severity(&self) -> Severity {
        self.config.min_severity
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        if !self.is_enabled() {
            return Err(ChannelError::Disabled);
        }

        let message = self.render(notification);
        let result = self.transport.deliver(&message).await;
        match &result {
            Ok(()) => debug!(
                "Email for event #{} sent to {} recipient(s)",
                notification.event_id,
                message.to.len()
            ),
            Err(e) => warn!("Email for event #{} failed: {}", notification.event_id, e),
        }
        self.stats.record(result)
    }
}
