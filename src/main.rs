use std::{net::SocketAddr, str::FromStr, sync::Arc};

use hookrelay::{
    dispatcher::{DispatcherConfig, build_http_client},
    heartbeat::{HeartbeatConfig, HeartbeatMonitor, SqliteHeartbeatStore},
    routes::router,
    state::AppState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:relay.db".to_string());
    let bind_addr =
        std::env::var("RELAY_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());
    let api_token = std::env::var("RELAY_API_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());

    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let dispatcher = DispatcherConfig::from_env();
    let http_client = build_http_client(&dispatcher)?;
    let heartbeats = Arc::new(SqliteHeartbeatStore::new(pool.clone()));

    let heartbeat_config = HeartbeatConfig::from_env();
    let heartbeat_source = heartbeat_config.source.clone();

    let cancel = CancellationToken::new();
    let monitor =
        HeartbeatMonitor::from_config(heartbeat_config, heartbeats.clone(), http_client.clone());
    let monitor_cancel = cancel.clone();
    let monitor_task = tokio::spawn(async move { monitor.run(monitor_cancel).await });

    let state = AppState {
        pool,
        http_client,
        dispatcher,
        heartbeats,
        heartbeat_source,
        api_token,
    };
    if state.api_token.is_none() {
        tracing::warn!("RELAY_API_TOKEN not set, /internal routes are unauthenticated");
    }

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "relay listening");

    let shutdown = cancel.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    monitor_task.await?;

    Ok(())
}
