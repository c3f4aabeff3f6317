use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use crate::{
    error::ApiError,
    extractors::ValidPath,
    heartbeat::{HeartbeatStoreError, SELF_TEST_HEADER},
    state::AppState,
    types::Heartbeat,
};

#[derive(Debug, Serialize)]
pub struct InboundAck {
    pub received: bool,
    pub self_test: bool,
}

pub async fn get_heartbeat_handler(
    State(state): State<AppState>,
    ValidPath(source): ValidPath<String>,
) -> Result<Json<Heartbeat>, ApiError> {
    let heartbeat = state
        .heartbeats
        .get_last_heartbeat(&source)
        .await
        .map_err(map_heartbeat_error)?
        .ok_or_else(|| ApiError::not_found("no heartbeat recorded for source"))?;

    Ok(Json(heartbeat))
}

/// Inbound webhook from the monitored source. Any delivery counts as
/// liveness; the monitor's own self-test is acknowledged without being
/// recorded, since the monitor writes the outcome itself. Other sources
/// are unknown and get a 404.
pub async fn inbound_webhook_handler(
    State(state): State<AppState>,
    ValidPath(source): ValidPath<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<InboundAck>), ApiError> {
    if source != state.heartbeat_source {
        tracing::warn!(%source, "inbound webhook for unknown source");
        return Err(ApiError::not_found("unknown webhook source"));
    }

    let self_test = headers
        .get(SELF_TEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"));

    if !self_test {
        let heartbeat = state
            .heartbeats
            .record_inbound(&source)
            .await
            .map_err(map_heartbeat_error)?;
        tracing::debug!(source = %heartbeat.source, count = heartbeat.count, "inbound heartbeat");
    }

    Ok((
        StatusCode::OK,
        Json(InboundAck {
            received: true,
            self_test,
        }),
    ))
}

fn map_heartbeat_error(err: HeartbeatStoreError) -> ApiError {
    match err {
        HeartbeatStoreError::Db(db) => ApiError::Db(db),
        HeartbeatStoreError::Parse(message) => ApiError::Internal(message),
    }
}
