use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::dispatcher::envelope::SerializedEnvelope;
use crate::dispatcher::store::{
    record_delivery_failure, record_delivery_success, subscription_is_active,
};
use crate::dispatcher::DispatcherConfig;
use crate::signing::sign_payload;
use crate::time::format_utc;
use crate::types::{DeliveryAttempt, DeliveryErrorKind, DeliveryResult, WebhookSubscription};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

struct AttemptError {
    kind: DeliveryErrorKind,
    status: Option<u16>,
    message: String,
}

/// Deliver one envelope to one subscription, retrying on any failure.
///
/// Terminal failures come back as a `DeliveryResult` with `success: false`;
/// nothing here returns an error to the caller. Health bookkeeping runs
/// after the last attempt. A subscription that is inactive, in the snapshot
/// or in the store, is skipped without any request.
pub async fn deliver(
    pool: &SqlitePool,
    client: &reqwest::Client,
    config: &DispatcherConfig,
    subscription: &WebhookSubscription,
    envelope: &SerializedEnvelope,
) -> DeliveryResult {
    let started = Instant::now();

    if !is_deliverable(pool, subscription).await {
        info!(
            subscription_id = %subscription.id,
            event_type = %envelope.event_type,
            "skipping delivery to inactive subscription"
        );
        return DeliveryResult {
            subscription_id: subscription.id,
            success: false,
            status_code: None,
            duration_ms: elapsed_ms(started),
            attempts: 0,
            error: Some("subscription is inactive".to_string()),
            attempt_log: Vec::new(),
        };
    }

    let signature = match sign_payload(&envelope.body, &subscription.secret) {
        Ok(signature) => signature,
        Err(err) => {
            error!(
                subscription_id = %subscription.id,
                event_type = %envelope.event_type,
                error = %err,
                "refusing to deliver unsigned webhook"
            );
            return DeliveryResult {
                subscription_id: subscription.id,
                success: false,
                status_code: None,
                duration_ms: elapsed_ms(started),
                attempts: 0,
                error: Some(err.to_string()),
                attempt_log: Vec::new(),
            };
        }
    };

    let max_attempts = config.max_attempts.max(1);
    let mut attempt_log = Vec::with_capacity(max_attempts as usize);
    let mut last_error = None;

    for attempt_number in 1..=max_attempts {
        let attempt_started_at = format_utc(Utc::now());
        let attempt_started = Instant::now();
        let outcome = send_once(client, config, subscription, envelope, &signature).await;
        let duration_ms = elapsed_ms(attempt_started);

        match outcome {
            Ok(status) => {
                attempt_log.push(DeliveryAttempt {
                    subscription_id: subscription.id,
                    attempt_number,
                    started_at: attempt_started_at,
                    succeeded: true,
                    http_status: Some(status),
                    error_kind: None,
                    error: None,
                    duration_ms,
                });

                info!(
                    subscription_id = %subscription.id,
                    event_type = %envelope.event_type,
                    attempt = attempt_number,
                    status,
                    "webhook delivered"
                );

                if let Err(err) =
                    record_delivery_success(pool, subscription.id, Utc::now()).await
                {
                    error!(subscription_id = %subscription.id, error = %err, "failed to record delivery success");
                }

                return DeliveryResult {
                    subscription_id: subscription.id,
                    success: true,
                    status_code: Some(status),
                    duration_ms: elapsed_ms(started),
                    attempts: attempt_number,
                    error: None,
                    attempt_log,
                };
            }
            Err(err) => {
                warn!(
                    subscription_id = %subscription.id,
                    event_type = %envelope.event_type,
                    attempt = attempt_number,
                    max_attempts,
                    error = %err.message,
                    "webhook delivery attempt failed"
                );

                attempt_log.push(DeliveryAttempt {
                    subscription_id: subscription.id,
                    attempt_number,
                    started_at: attempt_started_at,
                    succeeded: false,
                    http_status: err.status,
                    error_kind: Some(err.kind),
                    error: Some(err.message.clone()),
                    duration_ms,
                });
                last_error = Some(err);
            }
        }

        if attempt_number < max_attempts {
            let delay = retry_delay(config, attempt_number);
            debug!(subscription_id = %subscription.id, delay_ms = delay.as_millis() as u64, "waiting before retry");
            tokio::time::sleep(delay).await;
        }
    }

    match record_delivery_failure(pool, subscription.id, Utc::now(), config.failure_threshold).await
    {
        Ok(health) if !health.is_active => {
            warn!(
                subscription_id = %subscription.id,
                failure_count = health.failure_count,
                "subscription disabled after repeated delivery failures"
            );
        }
        Ok(health) => {
            debug!(subscription_id = %subscription.id, failure_count = health.failure_count, "delivery failure recorded");
        }
        Err(err) => {
            error!(subscription_id = %subscription.id, error = %err, "failed to record delivery failure");
        }
    }

    DeliveryResult {
        subscription_id: subscription.id,
        success: false,
        status_code: last_error.as_ref().and_then(|err| err.status),
        duration_ms: elapsed_ms(started),
        attempts: max_attempts,
        error: last_error.map(|err| err.message),
        attempt_log,
    }
}

async fn is_deliverable(pool: &SqlitePool, subscription: &WebhookSubscription) -> bool {
    if !subscription.is_active {
        return false;
    }
    match subscription_is_active(pool, subscription.id).await {
        Ok(active) => active,
        Err(err) => {
            warn!(
                subscription_id = %subscription.id,
                error = %err,
                "could not re-check subscription state, delivering from snapshot"
            );
            true
        }
    }
}

async fn send_once(
    client: &reqwest::Client,
    config: &DispatcherConfig,
    subscription: &WebhookSubscription,
    envelope: &SerializedEnvelope,
    signature: &str,
) -> Result<u16, AttemptError> {
    let request = client
        .post(&subscription.url)
        .header(CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(EVENT_HEADER, &envelope.event_type)
        .header(TIMESTAMP_HEADER, &envelope.timestamp)
        .header(USER_AGENT, &config.user_agent)
        .body(envelope.body.clone());

    // Dropping the send future on timeout aborts the request.
    let response = match tokio::time::timeout(config.request_timeout, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) if err.is_timeout() => {
            return Err(timeout_error(config.request_timeout));
        }
        Ok(Err(err)) => {
            return Err(AttemptError {
                kind: DeliveryErrorKind::Network,
                status: None,
                message: err.to_string(),
            });
        }
        Err(_) => return Err(timeout_error(config.request_timeout)),
    };

    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(AttemptError {
            kind: DeliveryErrorKind::HttpStatus,
            status: Some(status.as_u16()),
            message: format!("HTTP {}", status.as_u16()),
        })
    }
}

fn timeout_error(timeout: Duration) -> AttemptError {
    AttemptError {
        kind: DeliveryErrorKind::Timeout,
        status: None,
        message: format!("request timed out after {}ms", timeout.as_millis()),
    }
}

fn retry_delay(config: &DispatcherConfig, attempt_number: u32) -> Duration {
    let base = config.delay_after_attempt(attempt_number);
    if config.retry_jitter_ms == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0..=config.retry_jitter_ms);
    base + Duration::from_millis(jitter)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_without_jitter_is_exact() {
        let config = DispatcherConfig::default();
        assert_eq!(retry_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(retry_delay(&config, 2), Duration::from_secs(5));
    }

    #[test]
    fn retry_delay_jitter_stays_in_bounds() {
        let config = DispatcherConfig {
            retry_jitter_ms: 250,
            ..DispatcherConfig::default()
        };
        for _ in 0..100 {
            let delay = retry_delay(&config, 1);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1_250));
        }
    }
}
