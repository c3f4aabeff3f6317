mod config;
mod envelope;
mod executor;
mod fanout;
mod store;

pub use config::{DEFAULT_USER_AGENT, DispatcherConfig};
pub(crate) use config::parse_delay_list;
pub use envelope::SerializedEnvelope;
pub use executor::{EVENT_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, deliver};
pub use fanout::{DispatchError, dispatch_event};
pub use store::{
    HealthUpdate, ListSubscriptionsParams, NewSubscription, StoreError, create_subscription,
    get_subscription, list_matching_subscriptions, list_subscriptions, record_delivery_failure,
    record_delivery_success, reenable_subscription, subscription_is_active,
};

/// Builds the shared HTTP client used for outbound deliveries.
///
/// Timeouts are applied per request by each caller, not here.
pub fn build_http_client(config: &DispatcherConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
}
