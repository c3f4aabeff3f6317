use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

/// One HTTP attempt against a subscriber. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DeliveryAttempt {
    pub subscription_id: Uuid,
    pub attempt_number: u32,
    pub started_at: String,
    pub succeeded: bool,
    pub http_status: Option<u16>,
    pub error_kind: Option<DeliveryErrorKind>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    Timeout,
    Network,
    HttpStatus,
    Signing,
}

/// Outcome of delivering one envelope to one subscription, retries included.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DeliveryResult {
    pub subscription_id: Uuid,
    pub success: bool,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub attempts: u32,
    pub error: Option<String>,
    pub attempt_log: Vec<DeliveryAttempt>,
}
