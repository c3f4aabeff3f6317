mod config;
mod monitor;
mod notifier;
mod resubscribe;
mod store;

pub use config::{DEFAULT_SOURCE, HeartbeatConfig};
pub use monitor::{HeartbeatMonitor, MonitorError, MonitorOutcome, SELF_TEST_HEADER};
pub use notifier::{AlertNotifier, ChatWebhookNotifier, LogNotifier};
pub use resubscribe::{HttpResubscriber, NoopResubscriber, ResubscribeError, Resubscriber};
pub use store::{HeartbeatStore, HeartbeatStoreError, InMemoryHeartbeatStore, SqliteHeartbeatStore};
