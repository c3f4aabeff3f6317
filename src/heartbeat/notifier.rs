use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::types::{Alert, AlertLevel};

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Best effort. Implementations log delivery problems and never retry.
    async fn notify(&self, alert: &Alert);
}

/// Posts alerts as JSON to a team chat incoming-webhook URL.
pub struct ChatWebhookNotifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ChatWebhookNotifier {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AlertNotifier for ChatWebhookNotifier {
    async fn notify(&self, alert: &Alert) {
        let request = self.client.post(&self.url).timeout(self.timeout).json(alert);
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!(title = %alert.title, "alert sent");
            }
            Ok(response) => {
                warn!(
                    title = %alert.title,
                    status = response.status().as_u16(),
                    "alert webhook rejected notification"
                );
            }
            Err(err) => {
                warn!(title = %alert.title, error = %err, "failed to send alert");
            }
        }
    }
}

/// Fallback when no chat webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: &Alert) {
        match alert.level {
            AlertLevel::Info | AlertLevel::Success => {
                info!(title = %alert.title, message = %alert.message, "alert");
            }
            AlertLevel::Warning => {
                warn!(title = %alert.title, message = %alert.message, "alert");
            }
            AlertLevel::Error => {
                error!(title = %alert.title, message = %alert.message, "alert");
            }
        }
    }
}
