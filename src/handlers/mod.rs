pub mod dispatcher;
pub mod heartbeat;
pub mod subscriptions;
