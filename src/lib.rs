//! Outbound webhook relay.
//!
//! Fans internal events out to per-profile subscriber endpoints with signed,
//! retried HTTP deliveries, tracks subscriber health with a one-way
//! auto-disable, and watches an inbound integration's heartbeat.

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod heartbeat;
pub mod routes;
pub mod signing;
pub mod state;
pub mod time;
pub mod types;
