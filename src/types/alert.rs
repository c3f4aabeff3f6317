use serde::{Deserialize, Serialize};
use specta::Type;

/// Body posted to the team chat webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Error,
}
