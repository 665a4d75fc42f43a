//! State-change alerts
//!
//! Fired once per state change, never on a steady state. Delivery failures
//! are logged and otherwise ignored.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::config::MailConfig;
use crate::exec::{CommandRunner, CommandSpec, ExecError};
use crate::monitor::{HealthReport, ServerState};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Result type for alert delivery
pub type AlertResult<T> = Result<T, AlertError>;

/// Alert delivery errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("invalid mail address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build mail: {0}")]
    Message(String),

    #[error("smtp: {0}")]
    Smtp(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// One server state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateAlert {
    pub url: String,
    pub prev_state: ServerState,
    pub state: ServerState,
    pub at: DateTime<Utc>,
}

impl StateAlert {
    /// `None` when the report carries no state change.
    pub fn from_report(report: &HealthReport) -> Option<Self> {
        report.changed().then(|| Self {
            url: report.url.clone(),
            prev_state: report.prev_state,
            state: report.state,
            at: Utc::now(),
        })
    }

    pub fn subject(&self) -> String {
        format!("replwatch: {} is {}", self.url, self.state.as_str())
    }

    pub fn body(&self) -> String {
        format!(
            "Server {} changed state from {} to {} at {}.\n",
            self.url,
            self.prev_state.as_str(),
            self.state.as_str(),
            self.at.to_rfc3339()
        )
    }
}

/// Destination for state alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &StateAlert) -> AlertResult<()>;
}

/// Runs `<script> <url> <prev_state> <state>`.
pub struct ScriptAlert {
    script: String,
    runner: Arc<dyn CommandRunner>,
}

impl ScriptAlert {
    pub fn new(script: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            script: script.into(),
            runner,
        }
    }

    pub fn command(&self, alert: &StateAlert) -> CommandSpec {
        CommandSpec::new(&self.script).args([
            alert.url.as_str(),
            alert.prev_state.as_str(),
            alert.state.as_str(),
        ])
    }
}

#[async_trait]
impl AlertSink for ScriptAlert {
    fn name(&self) -> &'static str {
        "script"
    }

    async fn send(&self, alert: &StateAlert) -> AlertResult<()> {
        self.runner.run(&self.command(alert)).await?;
        Ok(())
    }
}

/// Plain-text mail over SMTP.
pub struct EmailAlert {
    config: MailConfig,
}

impl EmailAlert {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

fn mailbox(address: &str) -> AlertResult<lettre::message::Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| AlertError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl AlertSink for EmailAlert {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &StateAlert) -> AlertResult<()> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let mut builder = Message::builder()
            .from(mailbox(&self.config.from)?)
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.config.to {
            builder = builder.to(mailbox(to)?);
        }
        let email = builder
            .body(alert.body())
            .map_err(|e| AlertError::Message(e.to_string()))?;

        let mailer = if self.config.smtp_user.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_user.clone(),
                self.config.smtp_password.clone(),
            );
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| AlertError::Smtp(e.to_string()))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build()
        };

        mailer
            .send(email)
            .await
            .map_err(|e| AlertError::Smtp(e.to_string()))?;
        Ok(())
    }
}

/// Fans a state change out to every configured sink.
pub struct Alerter {
    sinks: Vec<Arc<dyn AlertSink>>,
    metrics: Arc<MetricsRegistry>,
}

impl Alerter {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            sinks: Vec::new(),
            metrics,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns the number of sinks that accepted the alert.
    pub async fn notify(&self, alert: &StateAlert) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.send(alert).await {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.increment_alerts_sent();
                    log_event_with_fields(
                        Event::AlertSent,
                        &[("url", &alert.url), ("sink", sink.name()), ("state", alert.state.as_str())],
                    );
                }
                Err(e) => log_event_with_fields(
                    Event::AlertFailed,
                    &[("url", &alert.url), ("sink", sink.name()), ("reason", &e.to_string())],
                ),
            }
        }
        delivered
    }
}
