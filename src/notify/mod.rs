//! Alert delivery.
//!
//! Defines the `MessageSink` trait plus two implementations:
//! - `TelegramSink`: Bot API `sendMessage`, one request per recipient
//! - `LogSink`: dry run, logs the message instead of sending it
//!
//! Per-race gating lives in [`state`].

pub mod state;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::types::DeliveryReport;

pub use state::{EvaluationWindow, NotificationStateMachine, NotifiedState, RaceNotifyState};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Anything that can push a text message to a list of recipients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `text` to every recipient. Per-recipient failures are counted
    /// in the report; `Err` is reserved for the sink being unusable.
    async fn send(&self, recipients: &[String], text: &str) -> Result<DeliveryReport>;

    /// Sink name for logging.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    Delivered,
    RateLimited,
    Failed,
}

/// Telegram Bot API sink.
pub struct TelegramSink {
    http: Client,
    token: SecretString,
    api_base: String,
}

impl TelegramSink {
    pub fn new(token: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("PADDOCK/0.1.0 (odds-alerts)")
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            token,
            api_base: TELEGRAM_API_BASE.to_string(),
        })
    }

    /// Point at a different API host (local bot server, tests).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn send_one(&self, chat_id: &str, text: &str) -> SendOutcome {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.token.expose_secret()
        );
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                // The URL carries the bot token.
                warn!(chat_id, error = %e.without_url(), "Telegram request failed");
                return SendOutcome::Failed;
            }
        };

        let status = resp.status();
        if status.is_success() {
            debug!(chat_id, "Telegram message delivered");
            SendOutcome::Delivered
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(chat_id, "Telegram rate limit hit");
            SendOutcome::RateLimited
        } else {
            let body = resp.text().await.unwrap_or_default();
            warn!(chat_id, status = %status, body = %body, "Telegram rejected message");
            SendOutcome::Failed
        }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, recipients: &[String], text: &str) -> Result<DeliveryReport> {
        let outcomes = join_all(recipients.iter().map(|chat| self.send_one(chat, text))).await;
        Ok(tally(&outcomes))
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

fn tally(outcomes: &[SendOutcome]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for outcome in outcomes {
        match outcome {
            SendOutcome::Delivered => report.delivered += 1,
            SendOutcome::RateLimited => {
                report.failed += 1;
                report.rate_limited = true;
            }
            SendOutcome::Failed => report.failed += 1,
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Logs messages instead of sending them. Every recipient counts as delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, recipients: &[String], text: &str) -> Result<DeliveryReport> {
        info!(
            recipients = recipients.len(),
            message = %text,
            "[DRY RUN] Would send alert"
        );
        Ok(DeliveryReport {
            delivered: recipients.len(),
            ..DeliveryReport::default()
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
