//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::rate_limit::PolicyOverride;

/// Request body for storing a cache entry (PUT /cache)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl CacheSetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.ttl == Some(0) {
            return Some("TTL must be greater than zero".to_string());
        }
        None
    }
}

/// Request body for a rate limit check (POST /rate-limit/check)
///
/// `max_requests` and `window_secs` override the named policy for this call.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitCheckRequest {
    pub key: String,
    pub policy: String,
    #[serde(default)]
    pub max_requests: Option<u32>,
    #[serde(default)]
    pub window_secs: Option<u64>,
}

impl RateLimitCheckRequest {
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.policy.is_empty() {
            return Some("Policy cannot be empty".to_string());
        }
        if self.max_requests == Some(0) || self.window_secs == Some(0) {
            return Some("Policy overrides must be greater than zero".to_string());
        }
        None
    }

    pub fn policy_override(&self) -> PolicyOverride {
        PolicyOverride {
            max_requests: self.max_requests,
            window: self.window_secs.map(Duration::from_secs),
        }
    }
}
