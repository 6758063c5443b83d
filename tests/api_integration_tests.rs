//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kv_coord::{api::create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    let mut config = Config::default();
    config.lock_retry_count = 0;
    create_router(AppState::from_config(&config))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_cache_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/cache/users")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"key":"test_key","value":"test_value"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
    assert_eq!(json["namespace"], "users");
}

#[tokio::test]
async fn test_cache_get_endpoint_success() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/cache/users",
        Some(json!({"key": "get_key", "value": "get_value"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/cache/users/get_key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], "get_value");
}

#[tokio::test]
async fn test_cache_namespaces_are_isolated() {
    let app = create_test_app();

    send(&app, "PUT", "/cache/a", Some(json!({"key": "k", "value": "from-a"}))).await;
    send(&app, "PUT", "/cache/a-other", Some(json!({"key": "k", "value": "from-b"}))).await;

    let (status, json) = send(&app, "DELETE", "/cache/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    let (status, _) = send(&app, "GET", "/cache/a/k", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, "GET", "/cache/a-other/k", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], "from-b");
}

#[tokio::test]
async fn test_cache_delete_endpoint() {
    let app = create_test_app();

    send(
        &app,
        "PUT",
        "/cache/users",
        Some(json!({"key": "delete_key", "value": "delete_value"})),
    )
    .await;

    let (status, _) = send(&app, "DELETE", "/cache/users/delete_key", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/cache/users/delete_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting an absent key is not an error
    let (status, _) = send(&app, "DELETE", "/cache/users/delete_key", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/cache/users",
        Some(json!({"key": "ttl_test", "value": "expires_soon", "ttl": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/cache/users/ttl_test", None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, _) = send(&app, "GET", "/cache/users/ttl_test", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Lock Endpoint Tests ==

#[tokio::test]
async fn test_lock_conflict_then_release() {
    let app = create_test_app();

    let (status, first) = send(&app, "POST", "/lock/report", Some(json!({"ttl_ms": 10_000}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["acquired"], true);
    assert!(first["validity_ms"].as_u64().unwrap() <= 10_000);
    let token = first["token"].as_str().unwrap().to_string();

    let (status, second) = send(&app, "POST", "/lock/report", Some(json!({"ttl_ms": 10_000}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(second["acquired"], false);
    assert!(second.get("token").is_none());

    let (status, json) = send(&app, "DELETE", &format!("/lock/report/{}", token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["released"], 1);

    let (status, _) = send(&app, "POST", "/lock/report", Some(json!({"ttl_ms": 10_000}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_release_with_wrong_token() {
    let app = create_test_app();

    send(&app, "POST", "/lock/report", Some(json!({"ttl_ms": 10_000}))).await;

    let (status, _) = send(&app, "DELETE", "/lock/report/not-the-token", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Still held
    let (status, _) = send(&app, "POST", "/lock/report", Some(json!({"ttl_ms": 10_000}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// == Debounce Endpoint Tests ==

#[tokio::test(start_paused = true)]
async fn test_debounce_burst_coalesces() {
    let app = create_test_app();
    let body = || Some(json!({"timeout_ms": 500}));

    let (status, json) = send(&app, "POST", "/debounce/reindex", body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "fired");

    for _ in 0..5 {
        let (_, json) = send(&app, "POST", "/debounce/reindex", body()).await;
        assert_eq!(json["outcome"], "scheduled");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    let (status, json) = send(&app, "GET", "/debounce/reindex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["fired"], 2);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    send(
        &app,
        "PUT",
        "/cache/users",
        Some(json!({"key": "stats_key", "value": "stats_value"})),
    )
    .await;
    send(&app, "GET", "/cache/users/stats_key", None).await;
    send(&app, "GET", "/cache/users/nonexistent", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"].as_u64().unwrap(), 1);
    assert_eq!(json["misses"].as_u64().unwrap(), 1);
    assert_eq!(json["total_keys"].as_u64().unwrap(), 1);
    assert!(json.get("hit_rate").is_some());
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/cache/users")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum returns 400 or 422 for JSON parsing errors
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/cache/users", Some(json!({"key": "", "value": "test"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_zero_debounce_timeout_rejected() {
    let app = create_test_app();

    let (status, json) = send(&app, "POST", "/debounce/k", Some(json!({"timeout_ms": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_unrepresentable_ttl_is_a_store_error() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/cache/users",
        Some(json!({"key": "k", "value": "v", "ttl": u64::MAX})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("invalid expire"));

    // The server keeps answering
    let (status, _) = send(&app, "GET", "/cache/users/k", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lock_ttl_inside_drift_allowance_rejected() {
    let app = create_test_app();

    let (status, json) = send(&app, "POST", "/lock/report", Some(json!({"ttl_ms": 2}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("drift"));
}

// == Live Server Test ==

#[tokio::test]
async fn test_live_server_lock_round_trip() {
    let mut config = Config::default();
    config.lock_retry_count = 0;
    let app = create_router(AppState::from_config(&config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let first: Value = client
        .post(format!("{}/lock/nightly", base))
        .json(&json!({"ttl_ms": 5_000}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["acquired"], true);

    let second = client
        .post(format!("{}/lock/nightly", base))
        .json(&json!({"ttl_ms": 5_000}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);

    let token = first["token"].as_str().unwrap();
    let release = client
        .delete(format!("{}/lock/nightly/{}", base, token))
        .send()
        .await
        .unwrap();
    assert_eq!(release.status(), reqwest::StatusCode::OK);

    server.abort();
}
