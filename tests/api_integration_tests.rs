//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use request_coordinator::{
    api::create_router, clock::ManualClock, storage::MemoryKvStore, AppState, Config,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

const START: u64 = 1_700_000_000_000;

fn create_test_app() -> (Router, MemoryKvStore, ManualClock) {
    let backend = MemoryKvStore::new();
    let clock = ManualClock::new(START);
    let state = AppState::from_config(
        &Config::default(),
        Arc::new(backend.clone()),
        Arc::new(clock.clone()),
    );
    (create_router(state), backend, clock)
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
    (status, body_to_json(response.into_body()).await)
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let (app, _, _) = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/cache",
        Some(json!({"key": "test_key", "value": "test_value"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("test_key"));
    assert_eq!(json["ttl"], 300);
}

#[tokio::test]
async fn test_get_endpoint_returns_structured_value() {
    let (app, _, _) = create_test_app();
    let profile = json!({"id": "u1", "name": "Ada", "tags": ["admin"]});

    let (status, _) = send(
        &app,
        "PUT",
        "/cache",
        Some(json!({"key": "profile:u1", "value": profile, "ttl": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/cache/profile:u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "profile:u1");
    assert_eq!(json["value"], profile);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let (app, _, _) = create_test_app();

    let (status, json) = send(&app, "GET", "/cache/nonexistent_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nonexistent_key"));
}

#[tokio::test]
async fn test_delete_endpoint() {
    let (app, _, _) = create_test_app();

    send(
        &app,
        "PUT",
        "/cache",
        Some(json!({"key": "delete_key", "value": "delete_value"})),
    )
    .await;

    let (status, _) = send(&app, "DELETE", "/cache/delete_key", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/cache/delete_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting again is not an error
    let (status, _) = send(&app, "DELETE", "/cache/delete_key", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let (app, backend, clock) = create_test_app();

    send(
        &app,
        "PUT",
        "/cache",
        Some(json!({"key": "ttl_test", "value": "expires_soon", "ttl": 1})),
    )
    .await;

    let (status, _) = send(&app, "GET", "/cache/ttl_test", None).await;
    assert_eq!(status, StatusCode::OK);

    clock.advance(1_001);

    let (status, _) = send(&app, "GET", "/cache/ttl_test", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(backend.is_empty().await, "Expired entry should be removed on read");
}

#[tokio::test]
async fn test_cache_reads_as_miss_when_storage_down() {
    let (app, backend, _) = create_test_app();

    send(
        &app,
        "PUT",
        "/cache",
        Some(json!({"key": "k", "value": 1})),
    )
    .await;
    backend.set_unavailable(true);

    let (status, _) = send(&app, "GET", "/cache/k", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Rate Limit Endpoint Tests ==

#[tokio::test]
async fn test_rate_limit_check_endpoint() {
    let (app, _, clock) = create_test_app();
    let body = json!({"key": "user:7", "policy": "search", "max_requests": 2});

    for expected in [1, 0] {
        let (status, json) = send(&app, "POST", "/rate-limit/check", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["allowed"], true);
        assert_eq!(json["remaining"], expected);
        assert!(json.get("retry_after_ms").is_none());
    }

    clock.advance(20_000);
    let (_, json) = send(&app, "POST", "/rate-limit/check", Some(body.clone())).await;
    assert_eq!(json["allowed"], false);
    assert_eq!(json["retry_after_ms"], 40_000);
    assert_eq!(json["reset_at"], "2023-11-14T22:14:20.000Z");

    let (status, _) = send(&app, "DELETE", "/rate-limit/search/user:7", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "POST", "/rate-limit/check", Some(body)).await;
    assert_eq!(json["allowed"], true);
}

#[tokio::test]
async fn test_rate_limit_check_with_huge_window() {
    let (app, _, clock) = create_test_app();
    let body = json!({
        "key": "user:8",
        "policy": "messaging",
        "max_requests": 1,
        "window_secs": u64::MAX
    });

    let (status, json) = send(&app, "POST", "/rate-limit/check", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["allowed"], true);

    clock.advance(1_000);
    let (status, json) = send(&app, "POST", "/rate-limit/check", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["allowed"], false);
}

#[tokio::test]
async fn test_rate_limit_fails_open_when_storage_down() {
    let (app, backend, _) = create_test_app();
    backend.set_unavailable(true);
    let body = json!({"key": "user:7", "policy": "auth"});

    for _ in 0..10 {
        let (status, json) = send(&app, "POST", "/rate-limit/check", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["allowed"], true);
    }

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert_eq!(stats["rate_limiter"]["failed_open"], 10);
}

#[tokio::test]
async fn test_rate_limit_unknown_policy() {
    let (app, _, _) = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/rate-limit/check",
        Some(json!({"key": "user:7", "policy": "teleport"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("teleport"));
}

// == Stats and Health Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _, _) = create_test_app();

    send(
        &app,
        "PUT",
        "/cache",
        Some(json!({"key": "stats_key", "value": "stats_value"})),
    )
    .await;
    send(&app, "GET", "/cache/stats_key", None).await;
    send(&app, "GET", "/cache/nonexistent", None).await;
    send(
        &app,
        "POST",
        "/rate-limit/check",
        Some(json!({"key": "u", "policy": "api"})),
    )
    .await;

    let (status, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["entry_count"], 1);
    assert_eq!(json["hit_rate"], 0.5);
    assert_eq!(json["rate_limiter"]["admitted"], 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/cache")
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
    let (app, _, _) = create_test_app();

    let (status, json) = send(&app, "PUT", "/cache", Some(json!({"key": "", "value": "test"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}
