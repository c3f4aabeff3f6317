use axum::{Json, extract::State};

use crate::{
    dispatcher::{DispatchError, StoreError, dispatch_event},
    error::ApiError,
    extractors::ValidJson,
    state::AppState,
    types::{DispatchSummary, TriggerRequest},
};

pub async fn trigger_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<TriggerRequest>,
) -> Result<Json<DispatchSummary>, ApiError> {
    let req = normalize_trigger(req)?;

    let summary = dispatch_event(&state.pool, &state.http_client, &state.dispatcher, &req)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(summary))
}

/// Trims ids the same way subscription creation does, so lookups match.
fn normalize_trigger(req: TriggerRequest) -> Result<TriggerRequest, ApiError> {
    let profile_id = req.profile_id.trim();
    if profile_id.is_empty() {
        return Err(ApiError::validation("profile_id is required"));
    }
    let event_type = req.event_type.trim();
    if event_type.is_empty() {
        return Err(ApiError::validation("event_type is required"));
    }

    Ok(TriggerRequest {
        profile_id: profile_id.to_string(),
        event_type: event_type.to_string(),
        data: req.data,
    })
}

fn map_dispatch_error(err: DispatchError) -> ApiError {
    match err {
        DispatchError::Store(StoreError::Db(db)) => ApiError::Db(db),
        DispatchError::Store(StoreError::NotFound(message)) => ApiError::NotFound(message),
        DispatchError::Store(StoreError::Parse(message)) => ApiError::Internal(message),
        DispatchError::Serialize(err) => ApiError::Internal(err.to_string()),
    }
}
