use serde::{Deserialize, Serialize};
use specta::Type;

/// The JSON body sent to every subscriber matching an event.
///
/// Built once per trigger and shared read-only across the fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Type)]
pub struct EventEnvelope {
    pub event_type: String,
    pub profile_id: String,
    pub data: serde_json::Value,
    /// ISO-8601 UTC, millisecond precision.
    pub timestamp: String,
}
