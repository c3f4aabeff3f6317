pub mod alert;
pub mod api_error;
pub mod delivery;
pub mod dispatcher;
pub mod event_envelope;
pub mod heartbeat;
pub mod subscription;

#[allow(unused_imports)]
pub use alert::{Alert, AlertLevel};
#[allow(unused_imports)]
pub use api_error::{ApiErrorCode, ApiErrorResponse};
#[allow(unused_imports)]
pub use delivery::{DeliveryAttempt, DeliveryErrorKind, DeliveryResult};
#[allow(unused_imports)]
pub use dispatcher::{DispatchSummary, TriggerRequest};
#[allow(unused_imports)]
pub use event_envelope::EventEnvelope;
#[allow(unused_imports)]
pub use heartbeat::{Heartbeat, HeartbeatStatus};
#[allow(unused_imports)]
pub use subscription::{
    CreateSubscriptionRequest, ListSubscriptionsResponse, SubscriptionSummary,
    WebhookSubscription,
};
