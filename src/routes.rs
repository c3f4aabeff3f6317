use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    auth::api_auth,
    handlers::{
        dispatcher::trigger_handler,
        heartbeat::{get_heartbeat_handler, inbound_webhook_handler},
        subscriptions::{
            create_subscription_handler, enable_subscription_handler, get_subscription_handler,
            list_subscriptions_handler,
        },
    },
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/webhooks/trigger", post(trigger_handler))
        .route(
            "/subscriptions",
            post(create_subscription_handler).get(list_subscriptions_handler),
        )
        .route("/subscriptions/:id", get(get_subscription_handler))
        .route("/subscriptions/:id/enable", post(enable_subscription_handler))
        .route("/heartbeats/:source", get(get_heartbeat_handler))
        .layer(middleware::from_fn_with_state(state.clone(), api_auth));

    Router::new()
        .nest("/internal", internal)
        .route("/webhooks/inbound/:source", post(inbound_webhook_handler))
        .with_state(state)
}
