use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "WisdomOS-Webhooks/1.0";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Per-request timeout; a timed out request counts as a failed attempt.
    pub request_timeout: Duration,
    /// Total attempts per delivery, first attempt included.
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `retry_delays[n - 1]`; the last
    /// entry is reused when attempts outnumber delays.
    pub retry_delays: Vec<Duration>,
    /// Upper bound of uniform random jitter added to each delay. Zero keeps
    /// the schedule fixed.
    pub retry_jitter_ms: u64,
    /// Cumulative exhausted deliveries after which a subscription is disabled.
    pub failure_threshold: u32,
    /// Cap on concurrent deliveries for one fan-out. `None` is unbounded.
    pub max_concurrent_deliveries: Option<usize>,
    pub user_agent: String,
}

impl DispatcherConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("RELAY_DELIVERY_TIMEOUT_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.request_timeout = Duration::from_millis(parsed.max(1));
        }
        if let Ok(value) = std::env::var("RELAY_MAX_ATTEMPTS")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.max_attempts = parsed.max(1);
        }
        if let Ok(value) = std::env::var("RELAY_RETRY_DELAYS_MS")
            && let Some(parsed) = parse_delay_list(&value)
        {
            config.retry_delays = parsed;
        }
        if let Ok(value) = std::env::var("RELAY_RETRY_JITTER_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry_jitter_ms = parsed;
        }
        if let Ok(value) = std::env::var("RELAY_FAILURE_THRESHOLD")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.failure_threshold = parsed.max(1);
        }
        if let Ok(value) = std::env::var("RELAY_MAX_CONCURRENT_DELIVERIES")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.max_concurrent_deliveries = (parsed > 0).then_some(parsed);
        }
        if let Ok(value) = std::env::var("RELAY_USER_AGENT")
            && !value.trim().is_empty()
        {
            config.user_agent = value.trim().to_string();
        }

        config
    }

    /// Delay to wait after a failed `attempt` (1-based) before the next one.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.retry_delays
            .get(index)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or_default()
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(15),
            ],
            retry_jitter_ms: 0,
            failure_threshold: 10,
            max_concurrent_deliveries: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Parse a comma separated list of millisecond delays, e.g. `1000,5000,15000`.
pub(crate) fn parse_delay_list(value: &str) -> Option<Vec<Duration>> {
    let delays = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().map(Duration::from_millis))
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    (!delays.is_empty()).then_some(delays)
}
