//! HTTP webhook channel
//!
//! POSTs each notification as JSON to a fixed URL, for dashboards, chat
//! bridges or an operator's own alert router. Uses the lightweight `ureq`
//! client on tokio's blocking pool; the core dispatcher already bounds each
//! attempt with its own timeout and retries, so the adapter makes one request
//! per `send`.
//!
//! ```rust,no_run
//! use aquaguard_connectors::webhook::{WebhookChannel, WebhookConfig};
//!
//! let config = WebhookConfig::new("https://alerts.example.org/hooks/aquaguard")
//!     .bearer_token("token")
//!     .timeout_secs(5);
//! let channel = WebhookChannel::new(config)?;
//! # Ok::<(), aquaguard_core::ChannelError>(())
//! ```
//!
//! Payload:
//!
//! ```json
//! {"system": "AquaGuard", "alert": { "event_id": 3, "severity": "critical", ... }}
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, warn};

use aquaguard_core::{AlertChannel, ChannelError, Notification, Severity};

use crate::{ChannelStats, StatsCell, DEFAULT_SYSTEM_NAME};

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    None,
    Bearer(String),
    Basic { username: String, password: String },
    /// Key sent in a custom header
    ApiKey { header: String, value: String },
}

/// Webhook configuration
#[derive(Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Request timeout inside `ureq`
    pub timeout: Duration,
    pub auth: AuthMethod,
    /// Custom headers
    pub headers: HashMap<String, String>,
    pub min_severity: Severity,
    pub system_name: String,
    pub user_agent: String,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            min_severity: Severity::Info,
            system_name: DEFAULT_SYSTEM_NAME.into(),
            user_agent: format!("AquaGuard/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::ApiKey {
            header: header.into(),
            value: value.into(),
        };
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }
}

/// Webhook alerts over HTTP(S)
pub struct WebhookChannel {
    config: WebhookConfig,
    agent: ureq::Agent,
    stats: StatsCell,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Result<Self, ChannelError> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(ChannelError::Format("Webhook URL must start with http:// or https://".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: StatsCell::default(),
        })
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }

    /// JSON body for one notification
    pub fn payload(&self, notification: &Notification) -> Result<String, ChannelError> {
        let body = serde_json::json!({
            "system": self.config.system_name,
            "alert": notification,
        });
        serde_json::to_string(&body).map_err(|e| ChannelError::Format(e.to_string()))
    }

    fn build_request(&self) -> ureq::Request {
        let mut request = self.agent.post(&self.config.url);

        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {}", token));
            }
            AuthMethod::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", username, password));
                request = request.set("Authorization", &format!("Basic {}", credentials));
            }
            AuthMethod::ApiKey { header, value } => {
                request = request.set(header, value);
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request.set("Content-Type", "application/json")
    }
}

/// Run one request to completion on the calling (blocking) thread
fn post(request: ureq::Request, body: &str) -> Result<(), ChannelError> {
    match request.send_string(body) {
        Ok(response) if (200..300).contains(&response.status()) => Ok(()),
        Ok(response) => Err(ChannelError::Transport(format!(
            "HTTP {} {}",
            response.status(),
            response.status_text()
        ))),
        Err(ureq::Error::Status(code, response)) => Err(ChannelError::Transport(format!(
            "HTTP {}: {}",
            code,
            response.into_string().unwrap_or_default()
        ))),
        Err(ureq::Error::Transport(e)) => Err(ChannelError::Transport(e.to_string())),
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn min_severity(&self) -> Severity {
        self.config.min_severity
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let body = self.payload(notification)?;
        let request = self.build_request();

        let result = tokio::task::spawn_blocking(move || post(request, &body))
            .await
            .unwrap_or_else(|e| Err(ChannelError::Transport(format!("webhook worker failed: {}", e))));

        match &result {
            Ok(()) => debug!("Webhook for event #{} delivered", notification.event_id),
            Err(e) => warn!("Webhook for event #{} failed: {}", notification.event_id, e),
        }
        self.stats.record(result)
    }
}
