use std::sync::Arc;

use chrono::Utc;
use reqwest::header::USER_AGENT;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::HeartbeatConfig;
use super::notifier::{AlertNotifier, ChatWebhookNotifier, LogNotifier};
use super::resubscribe::{HttpResubscriber, NoopResubscriber, Resubscriber};
use super::store::{HeartbeatStore, HeartbeatStoreError};
use crate::time::{format_utc, parse_utc};
use crate::types::{Alert, AlertLevel, Heartbeat, HeartbeatStatus};

/// Header marking the monitor's own end-to-end test request.
pub const SELF_TEST_HEADER: &str = "X-Heartbeat-Test";

/// What one monitor pass decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// No record existed; one was written and the subscription set up.
    Initialized,
    Healthy { age_secs: i64 },
    Reconnected { attempts: u32 },
    /// Resubscribed, but no self-test URL is configured so health was not
    /// asserted and the heartbeat was left untouched.
    Unverified,
    Failed { attempts: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("heartbeat store failed: {0}")]
    Store(#[from] HeartbeatStoreError),
}

enum ReconnectAttempt {
    Passed,
    Unverified,
    Failed(String),
}

pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    store: Arc<dyn HeartbeatStore>,
    resubscriber: Arc<dyn Resubscriber>,
    notifier: Arc<dyn AlertNotifier>,
    client: reqwest::Client,
}

impl HeartbeatMonitor {
    pub fn new(
        config: HeartbeatConfig,
        store: Arc<dyn HeartbeatStore>,
        resubscriber: Arc<dyn Resubscriber>,
        notifier: Arc<dyn AlertNotifier>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            store,
            resubscriber,
            notifier,
            client,
        }
    }

    /// Wire the HTTP resubscriber and chat notifier when their URLs are
    /// configured, falling back to no-op and log-only implementations.
    pub fn from_config(
        config: HeartbeatConfig,
        store: Arc<dyn HeartbeatStore>,
        client: reqwest::Client,
    ) -> Self {
        let resubscriber: Arc<dyn Resubscriber> = match &config.resubscribe_url {
            Some(url) => Arc::new(HttpResubscriber::new(
                client.clone(),
                url.clone(),
                config.resubscribe_token.clone(),
                config.self_test_url(),
                config.request_timeout,
            )),
            None => Arc::new(NoopResubscriber),
        };
        let notifier: Arc<dyn AlertNotifier> = match &config.alert_webhook_url {
            Some(url) => Arc::new(ChatWebhookNotifier::new(
                client.clone(),
                url.clone(),
                config.request_timeout,
            )),
            None => Arc::new(LogNotifier),
        };

        Self::new(config, store, resubscriber, notifier, client)
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Check liveness every `check_interval` until `cancel` fires.
    ///
    /// A failed pass is logged and the loop waits for the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            source = %self.config.source,
            interval_secs = self.config.check_interval.as_secs(),
            stale_secs = self.config.stale_threshold.as_secs(),
            "heartbeat monitor started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                result = self.check_once() => match result {
                    Ok(outcome) => debug!(source = %self.config.source, ?outcome, "heartbeat check finished"),
                    Err(err) => error!(source = %self.config.source, error = %err, "heartbeat check failed"),
                },
            }
        }

        info!(source = %self.config.source, "heartbeat monitor stopped");
    }

    /// One pass of the monitor state machine.
    pub async fn check_once(&self) -> Result<MonitorOutcome, MonitorError> {
        let source = self.config.source.as_str();

        let Some(last) = self.store.get_last_heartbeat(source).await? else {
            return self.initialize().await;
        };

        let age = parse_utc(&last.timestamp).map(|at| Utc::now() - at);
        let stale_after = chrono::Duration::from_std(self.config.stale_threshold)
            .unwrap_or(chrono::Duration::MAX);

        match age {
            Some(age) if age <= stale_after => {
                info!(source, age_secs = age.num_seconds(), "heartbeat healthy");
                Ok(MonitorOutcome::Healthy {
                    age_secs: age.num_seconds(),
                })
            }
            Some(age) => {
                warn!(
                    source,
                    age_secs = age.num_seconds(),
                    stale_secs = stale_after.num_seconds(),
                    "heartbeat stale, reconnecting"
                );
                self.handle_stale(last).await
            }
            None => {
                warn!(source, timestamp = %last.timestamp, "unreadable heartbeat timestamp, treating as stale");
                self.handle_stale(last).await
            }
        }
    }

    async fn initialize(&self) -> Result<MonitorOutcome, MonitorError> {
        let source = self.config.source.as_str();
        self.store
            .save_heartbeat(&Heartbeat {
                source: source.to_string(),
                timestamp: format_utc(Utc::now()),
                count: 0,
                status: HeartbeatStatus::Initialized,
            })
            .await?;

        if let Err(err) = self.resubscriber.resubscribe(source).await {
            warn!(source, error = %err, "initial subscription setup failed");
        }

        info!(source, "heartbeat initialized");
        Ok(MonitorOutcome::Initialized)
    }

    async fn handle_stale(&self, last: Heartbeat) -> Result<MonitorOutcome, MonitorError> {
        let source = self.config.source.as_str();
        let attempts = self.config.reconnect_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.reconnect_once().await {
                ReconnectAttempt::Passed => {
                    self.store
                        .save_heartbeat(&Heartbeat {
                            source: source.to_string(),
                            timestamp: format_utc(Utc::now()),
                            count: last.count + 1,
                            status: HeartbeatStatus::Reconnected,
                        })
                        .await?;

                    info!(source, attempt, "webhook source reconnected");
                    self.notifier
                        .notify(&Alert {
                            level: AlertLevel::Success,
                            title: format!("{source} reconnected"),
                            message: format!(
                                "Webhook source recovered after {attempt} reconnect attempt(s)."
                            ),
                        })
                        .await;
                    return Ok(MonitorOutcome::Reconnected { attempts: attempt });
                }
                ReconnectAttempt::Unverified => {
                    warn!(source, "resubscribed without self-test, health unknown");
                    self.notifier
                        .notify(&Alert {
                            level: AlertLevel::Warning,
                            title: format!("{source} resubscribed, unverified"),
                            message: "Heartbeat was stale. Resubscribed, but no self-test URL is \
                                      configured, so delivery could not be verified."
                                .to_string(),
                        })
                        .await;
                    return Ok(MonitorOutcome::Unverified);
                }
                ReconnectAttempt::Failed(reason) => {
                    warn!(source, attempt, attempts, error = %reason, "reconnect attempt failed");
                    last_error = reason;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.delay_after_attempt(attempt)).await;
            }
        }

        self.store
            .save_heartbeat(&Heartbeat {
                status: HeartbeatStatus::Failed,
                ..last
            })
            .await?;

        error!(source, attempts, error = %last_error, "reconnect failed, manual intervention required");
        self.notifier
            .notify(&Alert {
                level: AlertLevel::Error,
                title: format!("{source} reconnect failed"),
                message: format!(
                    "Reconnect failed after {attempts} attempt(s): {last_error}. \
                     Manual intervention required."
                ),
            })
            .await;

        Ok(MonitorOutcome::Failed { attempts })
    }

    async fn reconnect_once(&self) -> ReconnectAttempt {
        if let Err(err) = self.resubscriber.resubscribe(&self.config.source).await {
            return ReconnectAttempt::Failed(err.to_string());
        }

        let Some(url) = self.config.self_test_url() else {
            return ReconnectAttempt::Unverified;
        };

        let request = self
            .client
            .post(&url)
            .header(SELF_TEST_HEADER, "true")
            .header(USER_AGENT, &self.config.user_agent)
            .json(&serde_json::json!({
                "type": "heartbeat_test",
                "source": self.config.source,
                "timestamp": format_utc(Utc::now()),
            }));

        match tokio::time::timeout(self.config.self_test_timeout, request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => ReconnectAttempt::Passed,
            Ok(Ok(response)) => ReconnectAttempt::Failed(format!(
                "self-test returned HTTP {}",
                response.status().as_u16()
            )),
            Ok(Err(err)) => ReconnectAttempt::Failed(format!("self-test request failed: {err}")),
            Err(_) => ReconnectAttempt::Failed("self-test timed out".to_string()),
        }
    }
}
