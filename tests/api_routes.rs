#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    fs,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE},
    routing::post,
};
use http_body_util::BodyExt;
use hookrelay::{
    dispatcher::{DispatcherConfig, build_http_client},
    heartbeat::{DEFAULT_SOURCE, HeartbeatStore, SELF_TEST_HEADER, SqliteHeartbeatStore},
    routes::router,
    state::AppState,
    types::HeartbeatStatus,
};
use serde_json::{Value, json};
use sqlx::{
    Connection, SqliteConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tempfile::NamedTempFile;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    heartbeats: Arc<SqliteHeartbeatStore>,
    _db_file: NamedTempFile,
}

async fn setup_app(api_token: Option<&str>) -> TestApp {
    let db_file = NamedTempFile::new().expect("create temp sqlite file");
    let options = SqliteConnectOptions::new()
        .filename(db_file.path())
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(500));

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .expect("connect sqlite");

    let mut entries: Vec<_> = fs::read_dir("migrations")
        .expect("read migrations dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("sql"))
        .collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let contents = fs::read_to_string(entry.path()).expect("read migration");
        for stmt in contents.split(';') {
            let stmt = stmt.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(&mut conn)
                    .await
                    .expect("run migration");
            }
        }
    }

    conn.close().await.expect("close migration conn");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect pool");

    let dispatcher = DispatcherConfig::default();
    let heartbeats = Arc::new(SqliteHeartbeatStore::new(pool.clone()));
    let state = AppState {
        pool,
        http_client: build_http_client(&dispatcher).expect("http client"),
        dispatcher,
        heartbeats: heartbeats.clone(),
        heartbeat_source: DEFAULT_SOURCE.to_string(),
        api_token: api_token.map(str::to_string),
    };

    TestApp {
        app: router(state),
        heartbeats,
        _db_file: db_file,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn subscription_body(secret: &str) -> Value {
    json!({
        "profile_id": "profile-1",
        "url": "https://hooks.example.com/in",
        "secret": secret,
        "events": ["journal.created", " journal.created ", "score.updated"],
    })
}

/// Subscriber endpoint that accepts everything; returns its URL and hit count.
async fn spawn_subscriber() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/hook",
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }),
        )
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), hits)
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn internal_routes_require_token_when_configured() {
    let test = setup_app(Some("secret-token")).await;

    let (status, body) = send(&test.app, get("/internal/subscriptions")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let wrong = Request::builder()
        .uri("/internal/subscriptions")
        .header(AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&test.app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/internal/subscriptions")
        .header(AUTHORIZATION, "Bearer secret-token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&test.app, right).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscriptions"], json!([]));
}

#[tokio::test]
async fn inbound_webhooks_are_not_behind_the_token() {
    let test = setup_app(Some("secret-token")).await;

    let (status, body) = send(
        &test.app,
        post_json("/webhooks/inbound/hubspot_webhook", json!([{"eventId": 1}])),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriptions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_rejects_empty_secret() {
    let test = setup_app(None).await;

    let (status, body) = send(
        &test.app,
        post_json("/internal/subscriptions", subscription_body("  ")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
    assert_eq!(body["message"], "secret must be non-empty");
}

#[tokio::test]
async fn create_rejects_bad_url_and_missing_events() {
    let test = setup_app(None).await;

    let mut bad_url = subscription_body("s");
    bad_url["url"] = json!("ftp://example.com");
    let (status, _) = send(&test.app, post_json("/internal/subscriptions", bad_url)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut no_events = subscription_body("s");
    no_events["events"] = json!(["", "  "]);
    let (status, body) = send(&test.app, post_json("/internal/subscriptions", no_events)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "events must contain at least one event type");
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let test = setup_app(None).await;

    let request = Request::builder()
        .method("POST")
        .uri("/internal/subscriptions")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn create_get_list_and_enable() {
    let test = setup_app(None).await;

    let (status, created) = send(
        &test.app,
        post_json("/internal/subscriptions", subscription_body("whsec")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_active"], true);
    assert_eq!(created["failure_count"], 0);
    assert_eq!(created["events"], json!(["journal.created", "score.updated"]));
    assert!(created.get("secret").is_none(), "secret must not be exposed");

    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&test.app, get(&format!("/internal/subscriptions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());

    let (status, listed) = send(
        &test.app,
        get("/internal/subscriptions?profile_id=profile-1&active=true"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["subscriptions"].as_array().unwrap().len(), 1);

    let (_, inactive) = send(
        &test.app,
        get("/internal/subscriptions?profile_id=profile-1&active=false"),
    )
    .await;
    assert_eq!(inactive["subscriptions"], json!([]));

    let (status, enabled) = send(
        &test.app,
        post_json(&format!("/internal/subscriptions/{id}/enable"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(enabled["is_active"], true);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let test = setup_app(None).await;

    let (status, body) = send(
        &test.app,
        get(&format!("/internal/subscriptions/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send(&test.app, get("/internal/subscriptions/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, get("/internal/subscriptions?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─────────────────────────────────────────────────────────────────────────────
// Trigger
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn trigger_without_subscribers_reports_zero_deliveries() {
    let test = setup_app(None).await;

    let (status, body) = send(
        &test.app,
        post_json(
            "/internal/webhooks/trigger",
            json!({"profile_id": "unknown-profile", "event_type": "journal.created", "data": {"x": 1}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], 0);
    assert_eq!(body["delivered"], 0);
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn trigger_ids_are_trimmed_like_subscriptions() {
    let test = setup_app(None).await;
    let (url, hits) = spawn_subscriber().await;

    let mut body = subscription_body("whsec");
    body["profile_id"] = json!(" profile-1 ");
    body["url"] = json!(url);
    let (status, _) = send(&test.app, post_json("/internal/subscriptions", body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, summary) = send(
        &test.app,
        post_json(
            "/internal/webhooks/trigger",
            json!({"profile_id": " profile-1", "event_type": "journal.created ", "data": {}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["matched"], 1);
    assert_eq!(summary["delivered"], 1);
    assert_eq!(summary["profile_id"], "profile-1");
    assert_eq!(summary["event_type"], "journal.created");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn trigger_requires_event_type() {
    let test = setup_app(None).await;

    let (status, body) = send(
        &test.app,
        post_json(
            "/internal/webhooks/trigger",
            json!({"profile_id": "p", "event_type": " "}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "event_type is required");
}

// ─────────────────────────────────────────────────────────────────────────────
// Heartbeats
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbound_webhook_refreshes_heartbeat() {
    let test = setup_app(None).await;

    let (status, _) = send(&test.app, get("/internal/heartbeats/hubspot_webhook")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for _ in 0..2 {
        let (status, _) = send(
            &test.app,
            post_json("/webhooks/inbound/hubspot_webhook", json!([])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&test.app, get("/internal/heartbeats/hubspot_webhook")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["status"], "healthy");

    let stored = test
        .heartbeats
        .get_last_heartbeat("hubspot_webhook")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, HeartbeatStatus::Healthy);
}

#[tokio::test]
async fn inbound_webhook_for_unknown_source_is_rejected() {
    let test = setup_app(None).await;

    let (status, body) = send(
        &test.app,
        post_json("/webhooks/inbound/someone_else", json!([])),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert!(
        test.heartbeats
            .get_last_heartbeat("someone_else")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        test.heartbeats
            .get_last_heartbeat("hubspot_webhook")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn concurrent_inbound_webhooks_all_count() {
    let test = setup_app(None).await;

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let app = test.app.clone();
            tokio::spawn(async move {
                send(&app, post_json("/webhooks/inbound/hubspot_webhook", json!([]))).await
            })
        })
        .collect();
    for request in requests {
        let (status, _) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let stored = test
        .heartbeats
        .get_last_heartbeat("hubspot_webhook")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.count, 10);
}

#[tokio::test]
async fn self_test_requests_are_acknowledged_but_not_recorded() {
    let test = setup_app(None).await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/inbound/hubspot_webhook")
        .header(CONTENT_TYPE, "application/json")
        .header(SELF_TEST_HEADER, "true")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&test.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["self_test"], true);
    assert!(
        test.heartbeats
            .get_last_heartbeat("hubspot_webhook")
            .await
            .unwrap()
            .is_none()
    );
}
