use std::time::Duration;

use crate::dispatcher::DEFAULT_USER_AGENT;

pub const DEFAULT_SOURCE: &str = "hubspot_webhook";

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub source: String,
    pub check_interval: Duration,
    pub stale_threshold: Duration,
    pub reconnect_attempts: u32,
    /// Delay after reconnect attempt `n` is `reconnect_delays[n - 1]`.
    pub reconnect_delays: Vec<Duration>,
    /// Our own public base URL. The self-test posts to
    /// `<base>/webhooks/inbound/<source>`; `None` disables the self-test.
    pub self_test_base_url: Option<String>,
    pub self_test_timeout: Duration,
    /// Bound on each resubscribe and alert request.
    pub request_timeout: Duration,
    pub alert_webhook_url: Option<String>,
    pub resubscribe_url: Option<String>,
    pub resubscribe_token: Option<String>,
    pub user_agent: String,
}

impl HeartbeatConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("RELAY_HEARTBEAT_SOURCE")
            && !value.trim().is_empty()
        {
            config.source = value.trim().to_string();
        }
        if let Ok(value) = std::env::var("RELAY_HEARTBEAT_INTERVAL_MINUTES")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.check_interval = minutes(parsed.max(1));
        }
        if let Ok(value) = std::env::var("RELAY_HEARTBEAT_STALE_MINUTES")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.stale_threshold = minutes(parsed.max(1));
        }
        if let Ok(value) = std::env::var("RELAY_RECONNECT_ATTEMPTS")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.reconnect_attempts = parsed.max(1);
        }
        if let Ok(value) = std::env::var("RELAY_RECONNECT_DELAYS_MS")
            && let Some(parsed) = crate::dispatcher::parse_delay_list(&value)
        {
            config.reconnect_delays = parsed;
        }
        if let Ok(value) = std::env::var("RELAY_HEARTBEAT_REQUEST_TIMEOUT_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.request_timeout = Duration::from_millis(parsed.max(1));
        }
        config.self_test_base_url = non_empty_var("RELAY_SELF_TEST_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string());
        config.alert_webhook_url = non_empty_var("RELAY_ALERT_WEBHOOK_URL");
        config.resubscribe_url = non_empty_var("RELAY_RESUBSCRIBE_URL");
        config.resubscribe_token = non_empty_var("RELAY_RESUBSCRIBE_TOKEN");
        if let Some(value) = non_empty_var("RELAY_USER_AGENT") {
            config.user_agent = value;
        }

        config
    }

    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.reconnect_delays
            .get(index)
            .or_else(|| self.reconnect_delays.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn self_test_url(&self) -> Option<String> {
        self.self_test_base_url
            .as_deref()
            .map(|base| format!("{base}/webhooks/inbound/{}", self.source))
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            check_interval: minutes(5),
            stale_threshold: minutes(15),
            reconnect_attempts: 3,
            reconnect_delays: vec![minutes(1), minutes(2), minutes(4)],
            self_test_base_url: None,
            self_test_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            alert_webhook_url: None,
            resubscribe_url: None,
            resubscribe_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.source, "hubspot_webhook");
        assert_eq!(config.stale_threshold, Duration::from_secs(15 * 60));
        assert_eq!(config.delay_after_attempt(1), Duration::from_secs(60));
        assert_eq!(config.delay_after_attempt(2), Duration::from_secs(120));
        assert_eq!(config.delay_after_attempt(3), Duration::from_secs(240));
        assert!(config.self_test_url().is_none());
    }

    #[test]
    fn self_test_url_targets_inbound_route() {
        let config = HeartbeatConfig {
            self_test_base_url: Some("https://relay.example.com".to_string()),
            ..HeartbeatConfig::default()
        };
        assert_eq!(
            config.self_test_url().as_deref(),
            Some("https://relay.example.com/webhooks/inbound/hubspot_webhook")
        );
    }
}
