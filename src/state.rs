use std::sync::Arc;

use sqlx::SqlitePool;

use crate::dispatcher::DispatcherConfig;
use crate::heartbeat::HeartbeatStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub http_client: reqwest::Client,
    pub dispatcher: DispatcherConfig,
    pub heartbeats: Arc<dyn HeartbeatStore>,
    /// The one source the inbound webhook route accepts.
    pub heartbeat_source: String,
    pub api_token: Option<String>,
}
