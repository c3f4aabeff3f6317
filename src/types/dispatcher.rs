use serde::{Deserialize, Serialize};
use specta::Type;

use super::DeliveryResult;

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct TriggerRequest {
    pub profile_id: String,
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DispatchSummary {
    pub event_type: String,
    pub profile_id: String,
    pub matched: u32,
    pub delivered: u32,
    pub failed: u32,
    pub results: Vec<DeliveryResult>,
}
