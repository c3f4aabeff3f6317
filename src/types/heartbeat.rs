use serde::{Deserialize, Serialize};
use specta::Type;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct Heartbeat {
    pub source: String,
    pub timestamp: String,
    pub count: i64,
    pub status: HeartbeatStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    Initialized,
    Healthy,
    Reconnected,
    Failed,
}

impl HeartbeatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HeartbeatStatus::Initialized => "initialized",
            HeartbeatStatus::Healthy => "healthy",
            HeartbeatStatus::Reconnected => "reconnected",
            HeartbeatStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initialized" => Some(HeartbeatStatus::Initialized),
            "healthy" => Some(HeartbeatStatus::Healthy),
            "reconnected" => Some(HeartbeatStatus::Reconnected),
            "failed" => Some(HeartbeatStatus::Failed),
            _ => None,
        }
    }
}
