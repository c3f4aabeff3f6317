use futures::future::join_all;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::dispatcher::envelope::SerializedEnvelope;
use crate::dispatcher::executor::deliver;
use crate::dispatcher::store::{StoreError, list_matching_subscriptions};
use crate::dispatcher::DispatcherConfig;
use crate::types::{DispatchSummary, EventEnvelope, TriggerRequest};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("subscription lookup failed: {0}")]
    Store(StoreError),
    #[error("failed to serialize event envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Fan one trigger out to every matching active subscription.
///
/// Deliveries run concurrently and complete in no particular order. Zero
/// matches yields an empty summary, not an error.
pub async fn dispatch_event(
    pool: &SqlitePool,
    client: &reqwest::Client,
    config: &DispatcherConfig,
    trigger: &TriggerRequest,
) -> Result<DispatchSummary, DispatchError> {
    let subscriptions =
        list_matching_subscriptions(pool, &trigger.profile_id, &trigger.event_type).await?;

    if subscriptions.is_empty() {
        debug!(
            profile_id = %trigger.profile_id,
            event_type = %trigger.event_type,
            "no active subscriptions for event"
        );
        return Ok(DispatchSummary {
            event_type: trigger.event_type.clone(),
            profile_id: trigger.profile_id.clone(),
            matched: 0,
            delivered: 0,
            failed: 0,
            results: Vec::new(),
        });
    }

    let envelope = EventEnvelope::new(
        trigger.profile_id.clone(),
        trigger.event_type.clone(),
        trigger.data.clone(),
    );
    let serialized = SerializedEnvelope::new(&envelope)?;

    let limiter = config.max_concurrent_deliveries.map(Semaphore::new);
    let deliveries = subscriptions.iter().map(|subscription| {
        let limiter = limiter.as_ref();
        let serialized = &serialized;
        async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire().await.ok(),
                None => None,
            };
            deliver(pool, client, config, subscription, serialized).await
        }
    });
    let results = join_all(deliveries).await;

    let delivered = results.iter().filter(|result| result.success).count() as u32;
    let matched = results.len() as u32;

    info!(
        profile_id = %trigger.profile_id,
        event_type = %trigger.event_type,
        matched,
        delivered,
        "event dispatched"
    );

    Ok(DispatchSummary {
        event_type: envelope.event_type,
        profile_id: envelope.profile_id,
        matched,
        delivered,
        failed: matched - delivered,
        results,
    })
}
