use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    dispatcher::{
        ListSubscriptionsParams, NewSubscription, StoreError, create_subscription,
        get_subscription, list_subscriptions, reenable_subscription,
    },
    error::ApiError,
    extractors::{ValidJson, ValidPath, ValidQuery},
    state::AppState,
    types::{CreateSubscriptionRequest, ListSubscriptionsResponse, SubscriptionSummary},
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListSubscriptionsQuery {
    profile_id: Option<String>,
    active: Option<bool>,
    limit: Option<i64>,
}

pub async fn create_subscription_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionSummary>), ApiError> {
    let new = validate_create(req)?;

    let subscription = create_subscription(&state.pool, &new)
        .await
        .map_err(map_store_error)?;

    tracing::info!(
        subscription_id = %subscription.id,
        profile_id = %subscription.profile_id,
        "subscription created"
    );

    Ok((StatusCode::CREATED, Json(subscription.into())))
}

pub async fn list_subscriptions_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListSubscriptionsQuery>,
) -> Result<Json<ListSubscriptionsResponse>, ApiError> {
    let limit = match query.limit {
        None => DEFAULT_LIMIT,
        Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
        Some(_) => {
            return Err(ApiError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
    };
    let profile_id = query
        .profile_id
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty());

    let params = ListSubscriptionsParams {
        profile_id,
        active: query.active,
        limit,
    };
    let subscriptions = list_subscriptions(&state.pool, &params)
        .await
        .map_err(map_store_error)?;

    Ok(Json(ListSubscriptionsResponse {
        subscriptions: subscriptions.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_subscription_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<SubscriptionSummary>, ApiError> {
    let subscription = get_subscription(&state.pool, id)
        .await
        .map_err(map_store_error)?;

    Ok(Json(subscription.into()))
}

pub async fn enable_subscription_handler(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Json<SubscriptionSummary>, ApiError> {
    let subscription = reenable_subscription(&state.pool, id)
        .await
        .map_err(map_store_error)?;

    tracing::info!(subscription_id = %subscription.id, "subscription re-enabled");

    Ok(Json(subscription.into()))
}

fn validate_create(req: CreateSubscriptionRequest) -> Result<NewSubscription, ApiError> {
    let profile_id = req.profile_id.trim().to_string();
    if profile_id.is_empty() {
        return Err(ApiError::validation("profile_id is required"));
    }

    let url = req.url.trim().to_string();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::validation("url must be an http(s) URL"));
    }
    if reqwest::Url::parse(&url).is_err() {
        return Err(ApiError::validation("url is not a valid URL"));
    }

    if req.secret.trim().is_empty() {
        return Err(ApiError::validation("secret must be non-empty"));
    }

    let mut events: Vec<String> = req
        .events
        .into_iter()
        .map(|event| event.trim().to_string())
        .filter(|event| !event.is_empty())
        .collect();
    events.sort();
    events.dedup();
    if events.is_empty() {
        return Err(ApiError::validation("events must contain at least one event type"));
    }

    Ok(NewSubscription {
        profile_id,
        url,
        secret: req.secret,
        events,
    })
}

fn map_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Db(db) => ApiError::Db(db),
        StoreError::NotFound(message) => ApiError::NotFound(message),
        StoreError::Parse(message) => ApiError::Internal(message),
    }
}
