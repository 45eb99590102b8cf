//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{CoordError, Result};
use crate::models::{
    CacheSetRequest, DeleteResponse, GetResponse, HealthResponse, RateLimitCheckRequest,
    RateLimitResponse, ResetResponse, SetResponse, StatsResponse,
};
use crate::rate_limit::RateLimiter;
use crate::storage::KvStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(cache: Arc<CacheStore>, limiter: Arc<RateLimiter>) -> Self {
        Self { cache, limiter }
    }

    /// Builds the cache store and rate limiter over one shared `store`.
    pub fn from_config(config: &Config, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        let cache = CacheStore::new(Arc::clone(&store), Arc::clone(&clock), config.cache_config());
        let limiter = RateLimiter::new(store, clock, config.rate_limiter_config());
        Self::new(Arc::new(cache), Arc::new(limiter))
    }

    /// Exposes the components of an existing coordinator.
    pub fn from_coordinator(coordinator: &Coordinator) -> Self {
        Self::new(
            Arc::clone(coordinator.cache()),
            Arc::clone(coordinator.limiter()),
        )
    }
}

/// Handler for PUT /cache
///
/// Stores any JSON value with an optional TTL in seconds.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<CacheSetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CoordError::Validation(error_msg));
    }

    let ttl = req
        .ttl
        .map(Duration::from_secs)
        .unwrap_or(state.cache.config().default_ttl);
    state.cache.set(&req.key, &req.value, ttl).await?;

    Ok(Json(SetResponse::new(req.key, ttl.as_secs())))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get::<Value>(&key).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CoordError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
///
/// Deleting a missing key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.stats().await;
    Json(StatsResponse::new(cache, state.limiter.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for POST /rate-limit/check
///
/// Records the request when admitted. A denial is a normal 200 response with
/// `allowed: false`.
pub async fn rate_limit_check_handler(
    State(state): State<AppState>,
    Json(req): Json<RateLimitCheckRequest>,
) -> Result<Json<RateLimitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CoordError::Validation(error_msg));
    }

    let decision = state
        .limiter
        .check_with(&req.key, &req.policy, req.policy_override())
        .await?;
    Ok(Json(decision.into()))
}

/// Handler for DELETE /rate-limit/:policy/:key
pub async fn rate_limit_reset_handler(
    State(state): State<AppState>,
    Path((policy, key)): Path<(String, String)>,
) -> Result<Json<ResetResponse>> {
    state.limiter.reset(&key, &policy).await?;
    Ok(Json(ResetResponse::new(policy, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::AUTH;
    use crate::storage::MemoryKvStore;
    use serde_json::json;

    fn create_state() -> AppState {
        AppState::from_config(
            &Config::default(),
            Arc::new(MemoryKvStore::new()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = create_state();

        let req = CacheSetRequest {
            key: "test_key".to_string(),
            value: json!({"name": "test_value"}),
            ttl: None,
        };
        let response = set_handler(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(response.ttl, 300);

        let response = get_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"name": "test_value"}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = create_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CoordError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = create_state();

        let req = CacheSetRequest {
            key: "to_delete".to_string(),
            value: json!("value"),
            ttl: Some(60),
        };
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = get_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_err());

        // Missing keys delete cleanly
        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = create_state();
        get_handler(State(state.clone()), Path("missing".to_string()))
            .await
            .unwrap_err();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.cache.hits, 0);
        assert_eq!(response.cache.misses, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = create_state();

        let req = CacheSetRequest {
            key: "".to_string(),
            value: json!("value"),
            ttl: None,
        };
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CoordError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_check_and_reset() {
        let state = create_state();
        let req = RateLimitCheckRequest {
            key: "login:bob".to_string(),
            policy: AUTH.to_string(),
            max_requests: None,
            window_secs: None,
        };

        for expected_remaining in [2, 1, 0] {
            let response = rate_limit_check_handler(State(state.clone()), Json(req.clone()))
                .await
                .unwrap();
            assert!(response.allowed);
            assert_eq!(response.remaining, expected_remaining);
        }
        let denied = rate_limit_check_handler(State(state.clone()), Json(req.clone()))
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_ms, Some(300_000));

        rate_limit_reset_handler(
            State(state.clone()),
            Path((AUTH.to_string(), "login:bob".to_string())),
        )
        .await
        .unwrap();
        let response = rate_limit_check_handler(State(state), Json(req))
            .await
            .unwrap();
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn test_rate_limit_unknown_policy() {
        let state = create_state();
        let req = RateLimitCheckRequest {
            key: "user:1".to_string(),
            policy: "nope".to_string(),
            max_requests: None,
            window_secs: None,
        };

        let result = rate_limit_check_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CoordError::Validation(_))));
    }
}
