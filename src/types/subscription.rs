use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// A subscriber endpoint registered for one profile.
///
/// `failure_count` counts exhausted deliveries since the last success.
/// Once it reaches the configured threshold `is_active` goes false and
/// stays false until an explicit re-enable.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub profile_id: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub last_success_at: Option<String>,
    pub last_failure_at: Option<String>,
    pub failure_count: i64,
    pub created_at: String,
}

/// Subscription as exposed over the API; the secret never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct SubscriptionSummary {
    pub id: Uuid,
    pub profile_id: String,
    pub url: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub last_success_at: Option<String>,
    pub last_failure_at: Option<String>,
    pub failure_count: i64,
    pub created_at: String,
}

impl From<WebhookSubscription> for SubscriptionSummary {
    fn from(sub: WebhookSubscription) -> Self {
        Self {
            id: sub.id,
            profile_id: sub.profile_id,
            url: sub.url,
            events: sub.events,
            is_active: sub.is_active,
            last_success_at: sub.last_success_at,
            last_failure_at: sub.last_failure_at,
            failure_count: sub.failure_count,
            created_at: sub.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct CreateSubscriptionRequest {
    pub profile_id: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListSubscriptionsResponse {
    pub subscriptions: Vec<SubscriptionSummary>,
}
