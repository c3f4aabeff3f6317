use chrono::Utc;

use crate::time::format_utc;
use crate::types::EventEnvelope;

impl EventEnvelope {
    /// Stamp a trigger with the current UTC time.
    pub fn new(
        profile_id: impl Into<String>,
        event_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            profile_id: profile_id.into(),
            data,
            timestamp: format_utc(Utc::now()),
        }
    }
}

/// An envelope serialized once, so every subscriber and every retry signs
/// and sends the same bytes.
#[derive(Debug, Clone)]
pub struct SerializedEnvelope {
    pub event_type: String,
    pub timestamp: String,
    pub body: Vec<u8>,
}

impl SerializedEnvelope {
    pub fn new(envelope: &EventEnvelope) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: envelope.event_type.clone(),
            timestamp: envelope.timestamp.clone(),
            body: serde_json::to_vec(envelope)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_has_wire_field_names() {
        let envelope = EventEnvelope::new("profile-1", "journal.created", json!({"id": 7}));
        let serialized = SerializedEnvelope::new(&envelope).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&serialized.body).unwrap();

        assert_eq!(value["event_type"], "journal.created");
        assert_eq!(value["profile_id"], "profile-1");
        assert_eq!(value["data"]["id"], 7);
        assert_eq!(value["timestamp"], envelope.timestamp.as_str());
        assert_eq!(serialized.timestamp, envelope.timestamp);
    }

    #[test]
    fn timestamp_is_iso_utc() {
        let envelope = EventEnvelope::new("p", "e", serde_json::Value::Null);
        assert!(envelope.timestamp.ends_with('Z'));
        assert!(crate::time::parse_utc(&envelope.timestamp).is_some());
    }
}
