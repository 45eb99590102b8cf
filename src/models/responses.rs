//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::clock::duration_millis;
use crate::rate_limit::{RateLimitDecision, RateLimiterStats};

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /cache
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Effective TTL in seconds
    pub ttl: u64,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, ttl: u64) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            ttl,
        }
    }
}

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Cache hits / (hits + misses)
    pub hit_rate: f64,
    pub rate_limiter: RateLimiterStats,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, rate_limiter: RateLimiterStats) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            rate_limiter,
        }
    }
}

/// Response body for POST /rate-limit/check
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResponse {
    pub allowed: bool,
    pub remaining: u32,
    /// RFC 3339 instant at which the oldest counted request leaves the window
    pub reset_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<RateLimitDecision> for RateLimitResponse {
    fn from(decision: RateLimitDecision) -> Self {
        // Saturated reset times sit past chrono's range
        let reset_at = i64::try_from(decision.reset_time)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        Self {
            allowed: decision.allowed,
            remaining: decision.remaining,
            reset_at,
            retry_after_ms: decision.retry_after.map(duration_millis),
        }
    }
}

/// Response body for DELETE /rate-limit/:policy/:key
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub policy: String,
    pub key: String,
}

impl ResetResponse {
    pub fn new(policy: impl Into<String>, key: impl Into<String>) -> Self {
        let policy = policy.into();
        let key = key.into();
        Self {
            message: format!("Rate window for '{}' under '{}' reset", key, policy),
            policy,
            key,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
