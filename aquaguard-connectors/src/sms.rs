//! SMS alert channel
//!
//! One line per alert, `"<SEVERITY>: <message>"`, kept to a single
//! 160-character segment and sent to every configured number through an
//! [`SmsGateway`].

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use aquaguard_core::{AlertChannel, ChannelError, Notification, Severity};

use crate::{ChannelStats, StatsCell};

/// Characters in one SMS segment
pub const SMS_MAX_CHARS: usize = 160;

/// Outbound SMS capability supplied by the embedding process
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, from: &str, to: &str, body: &str) -> Result<(), ChannelError>;
}

/// SMS channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub from_number: String,
    pub to_numbers: Vec<String>,
    pub min_severity: Severity,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            from_number: String::new(),
            to_numbers: Vec::new(),
            min_severity: Severity::Critical,
        }
    }
}

impl SmsConfig {
    pub fn new(from_number: impl Into<String>) -> Self {
        Self {
            from_number: from_number.into(),
            ..Self::default()
        }
    }

    pub fn to(mut self, number: impl Into<String>) -> Self {
        self.to_numbers.push(number.into());
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }
}

/// SMS alerts through an [`SmsGateway`]
pub struct SmsChannel<G> {
    config: SmsConfig,
    gateway: G,
    stats: StatsCell,
}

impl<G: SmsGateway> SmsChannel<G> {
    pub fn new(config: SmsConfig, gateway: G) -> Self {
        Self {
            config,
            gateway,
            stats: StatsCell::default(),
        }
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }

    /// Message text, cut on a character boundary
    pub fn render(notification: &Notification) -> String {
        format!("{}: {}", notification.severity.label(), notification.message)
            .chars()
            .take(SMS_MAX_CHARS)
            .collect()
    }
}

#[async_trait]
impl<G: SmsGateway> AlertChannel for SmsChannel<G> {
    fn name(&self) -> &str {
        "sms"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.to_numbers.is_empty()
    }

    fn min_severity(&self) -> Severity {
        self.config.min_severity
    }

    /// Every number is tried; the attempt fails if any of them failed
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        if !self.is_enabled() {
            return Err(ChannelError::Disabled);
        }

        let body = Self::render(notification);
        let mut first_error = None;
        let mut failed = 0;
        for number in &self.config.to_numbers {
            if let Err(e) = self.gateway.send_sms(&self.config.from_number, number, &body).await {
                warn!("SMS for event #{} to {} failed: {}", notification.event_id, number, e);
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        let result = match first_error {
            None => {
                debug!(
                    "SMS for event #{} sent to {} number(s)",
                    notification.event_id,
                    self.config.to_numbers.len()
                );
                Ok(())
            }
            Some(ChannelError::Transport(reason)) if failed > 1 => Err(ChannelError::Transport(format!(
                "{} of {} numbers failed, first: {}",
                failed,
                self.config.to_numbers.len(),
                reason
            ))),
            Some(e) => Err(e),
        };
        self.stats.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::notification;
    use aquaguard_core::TransitionKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Gateway {
        sent: Mutex<Vec<(String, String)>>,
        unreachable: Vec<&'static str>,
    }

    #[async_trait]
    impl SmsGateway for Gateway {
        async fn send_sms(&self, _from: &str, to: &str, body: &str) -> Result<(), ChannelError> {
            if self.unreachable.iter().any(|n| *n == to) {
                return Err(ChannelError::Transport(format!("{} unreachable", to)));
            }
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn config() -> SmsConfig {
        SmsConfig::new("+15550000").to("+15550001").to("+15550002")
    }

    #[tokio::test]
    async fn sends_one_line_to_every_number() {
        let channel = SmsChannel::new(config(), Gateway::default());
        let alert = notification(Severity::Critical, TransitionKind::Opened, "Turbidity rose 120%");

        channel.send(&alert).await.unwrap();

        let sent = channel.gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ("+15550001".to_string(), "CRITICAL: Turbidity rose 120%".to_string()));
        assert_eq!(sent[1].0, "+15550002");
    }

    #[test]
    fn long_messages_fit_one_segment() {
        let long = "é".repeat(300);
        let alert = notification(Severity::Warning, TransitionKind::Opened, &long);
        let body = SmsChannel::<Gateway>::render(&alert);
        assert_eq!(body.chars().count(), SMS_MAX_CHARS);
        assert!(body.starts_with("WARNING: é"));
    }

    #[tokio::test]
    async fn one_bad_number_fails_the_attempt_but_not_the_others() {
        let gateway = Gateway {
            unreachable: vec!["+15550001"],
            ..Gateway::default()
        };
        let channel = SmsChannel::new(config(), gateway);
        let alert = notification(Severity::Critical, TransitionKind::Opened, "x");

        let err = channel.send(&alert).await.unwrap_err();
        assert!(err.to_string().contains("+15550001 unreachable"));
        assert_eq!(channel.gateway.sent.lock().unwrap().len(), 1);
        assert_eq!(channel.stats().failed, 1);
    }

    #[test]
    fn only_critical_by_default() {
        let channel = SmsChannel::new(config(), Gateway::default());
        assert!(!channel.accepts(Severity::Warning));
        assert!(channel.accepts(Severity::Critical));
    }
}
