use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ResubscribeError {
    #[error("subscription request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("subscription API returned HTTP {0}")]
    HttpStatus(u16),
}

/// Re-establishes the upstream webhook subscription for a source.
#[async_trait]
pub trait Resubscriber: Send + Sync {
    async fn resubscribe(&self, source: &str) -> Result<(), ResubscribeError>;
}

#[derive(Serialize)]
struct ResubscribeBody<'a> {
    source: &'a str,
    target_url: Option<&'a str>,
}

/// Calls an upstream subscription API, optionally with a bearer token.
pub struct HttpResubscriber {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    target_url: Option<String>,
    timeout: Duration,
}

impl HttpResubscriber {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        token: Option<String>,
        target_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            token,
            target_url,
            timeout,
        }
    }
}

#[async_trait]
impl Resubscriber for HttpResubscriber {
    async fn resubscribe(&self, source: &str) -> Result<(), ResubscribeError> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&ResubscribeBody {
                source,
                target_url: self.target_url.as_deref(),
            });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ResubscribeError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no subscription API is configured; always succeeds.
#[derive(Debug, Default)]
pub struct NoopResubscriber;

#[async_trait]
impl Resubscriber for NoopResubscriber {
    async fn resubscribe(&self, source: &str) -> Result<(), ResubscribeError> {
        debug!(source, "no subscription API configured, skipping resubscribe");
        Ok(())
    }
}
