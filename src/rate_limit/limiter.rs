//! Sliding-window rate limiter over a persisted [`KvStore`].
//!
//! Storage trouble never denies a request: any failure to load or save a
//! window admits the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{duration_millis, Clock};
use crate::error::{validate_key, CoordError, Result};
use crate::rate_limit::{PolicyOverride, PolicyTable, RateLimitPolicy, RateWindow};
use crate::storage::{storage_key, KvStore, StorageError, StorageResult};

/// Storage namespace for rate windows
pub const RATE_LIMIT_NAMESPACE: &str = "ratelimit:";

/// Policies consulted by [`RateLimiter::is_suspicious`] by default.
pub const SUSPICIOUS_ACTIVITY_POLICIES: [&str; 3] = [
    crate::rate_limit::AUTH,
    crate::rate_limit::MESSAGING,
    crate::rate_limit::PROFILE_UPDATE,
];

// == Rate Limiter Config ==
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Windows with nothing newer than this are removed by cleanup
    pub retention: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(60 * 60),
        }
    }
}

// == Decision ==
/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the window after this one
    pub remaining: u32,
    /// When the oldest counted request leaves the window (Unix milliseconds)
    pub reset_time: u64,
    /// Set on denial
    pub retry_after: Option<Duration>,
}

// == Rate Limiter Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub admitted: u64,
    pub denied: u64,
    /// Admissions granted because storage failed
    pub failed_open: u64,
}

#[derive(Debug, Default)]
struct RateLimiterCounters {
    admitted: AtomicU64,
    denied: AtomicU64,
    failed_open: AtomicU64,
}

// == Rate Limiter ==
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    policies: PolicyTable,
    config: RateLimiterConfig,
    counters: RateLimiterCounters,
}

impl RateLimiter {
    /// Creates a limiter with the default policy table.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: RateLimiterConfig) -> Self {
        Self {
            store,
            clock,
            policies: PolicyTable::default(),
            config,
            counters: RateLimiterCounters::default(),
        }
    }

    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// Adds or replaces one named policy.
    pub fn register_policy(mut self, name: impl Into<String>, policy: RateLimitPolicy) -> Self {
        self.policies.insert(name, policy);
        self
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    // == Check ==
    /// Admits or denies one request by `key` under `policy_name`, recording
    /// it when admitted.
    pub async fn check(&self, key: &str, policy_name: &str) -> Result<RateLimitDecision> {
        self.check_with(key, policy_name, PolicyOverride::default())
            .await
    }

    /// [`check`](Self::check) with per-call policy parameters.
    pub async fn check_with(
        &self,
        key: &str,
        policy_name: &str,
        overrides: PolicyOverride,
    ) -> Result<RateLimitDecision> {
        validate_key(key)?;
        let policy = overrides.apply(self.resolve(policy_name)?);
        let skey = window_key(policy_name, key);
        let now = self.clock.now_millis();

        let mut window = match self.load(&skey, key, policy_name).await {
            Ok(window) => window,
            Err(err) => {
                warn!(key, policy = policy_name, error = %err, "Rate window unreadable, failing open");
                self.counters.failed_open.fetch_add(1, Ordering::Relaxed);
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
                return Ok(fail_open(policy, now));
            }
        };

        window.prune(now, policy.window_ms());
        if window.count() >= policy.max_requests as usize {
            self.counters.denied.fetch_add(1, Ordering::Relaxed);
            let decision = denial(&window, policy, now);
            info!(
                key,
                policy = policy_name,
                retry_after_ms = decision.retry_after.map(duration_millis),
                "Rate limit exceeded"
            );
            return Ok(decision);
        }

        window.record(now);
        if let Err(err) = self.save(&skey, &window).await {
            warn!(key, policy = policy_name, error = %err, "Rate window not persisted, failing open");
            self.counters.failed_open.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);

        Ok(RateLimitDecision {
            allowed: true,
            remaining: policy.max_requests.saturating_sub(window.count() as u32),
            reset_time: reset_time(&window, policy, now),
            retry_after: None,
        })
    }

    // == Peek ==
    /// Evaluates `key` under `policy_name` without recording anything.
    pub async fn peek(&self, key: &str, policy_name: &str) -> Result<RateLimitDecision> {
        validate_key(key)?;
        let policy = self.resolve(policy_name)?;
        let now = self.clock.now_millis();

        let mut window = match self.load(&window_key(policy_name, key), key, policy_name).await {
            Ok(window) => window,
            Err(err) => {
                warn!(key, policy = policy_name, error = %err, "Rate window unreadable, failing open");
                return Ok(fail_open(policy, now));
            }
        };

        window.prune(now, policy.window_ms());
        if window.count() >= policy.max_requests as usize {
            return Ok(denial(&window, policy, now));
        }

        Ok(RateLimitDecision {
            allowed: true,
            remaining: policy.max_requests.saturating_sub(window.count() as u32),
            reset_time: reset_time(&window, policy, now),
            retry_after: None,
        })
    }

    // == Reset ==
    /// Forgets every recorded request for `key` under `policy_name`.
    pub async fn reset(&self, key: &str, policy_name: &str) -> Result<()> {
        validate_key(key)?;
        self.resolve(policy_name)?;

        if let Err(err) = self.store.delete(&window_key(policy_name, key)).await {
            warn!(key, policy = policy_name, error = %err, "Rate window reset failed");
        }
        Ok(())
    }

    // == Cleanup ==
    /// Removes windows with no request newer than the retention horizon.
    /// Returns the number removed.
    pub async fn cleanup(&self) -> usize {
        let horizon = self
            .clock
            .now_millis()
            .saturating_sub(duration_millis(self.config.retention));

        let result = async {
            let keys = self.store.list_keys(RATE_LIMIT_NAMESPACE).await?;
            let raw = self.store.multi_get(&keys).await?;
            let stale: Vec<String> = keys
                .into_iter()
                .zip(raw)
                .filter_map(|(key, bytes)| {
                    let bytes = bytes?;
                    match serde_json::from_slice::<RateWindow>(&bytes) {
                        Ok(window) if !window.is_stale(horizon) => None,
                        _ => Some(key),
                    }
                })
                .collect();
            self.store.multi_delete(&stale).await?;
            StorageResult::Ok(stale.len())
        }
        .await;

        match result {
            Ok(removed) => {
                debug!(removed, "Rate window cleanup finished");
                removed
            }
            Err(err) => {
                warn!(error = %err, "Rate window cleanup failed");
                0
            }
        }
    }

    // == Suspicious Activity ==
    /// True when at least two of `policies` are currently exceeded by `actor`.
    ///
    /// A signal for review, not a block. Nothing is recorded.
    pub async fn is_suspicious(&self, actor: &str, policies: &[&str]) -> Result<bool> {
        let mut exceeded = 0;
        for policy in policies {
            if !self.peek(actor, policy).await?.allowed {
                exceeded += 1;
            }
        }

        if exceeded >= 2 {
            info!(actor, exceeded, "Suspicious activity detected");
        }
        Ok(exceeded >= 2)
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            denied: self.counters.denied.load(Ordering::Relaxed),
            failed_open: self.counters.failed_open.load(Ordering::Relaxed),
        }
    }

    fn resolve(&self, policy_name: &str) -> Result<RateLimitPolicy> {
        self.policies
            .get(policy_name)
            .ok_or_else(|| CoordError::Validation(format!("Unknown rate limit policy: {}", policy_name)))
    }

    async fn load(&self, skey: &str, key: &str, policy_name: &str) -> StorageResult<RateWindow> {
        match self.store.get(skey).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(StorageError::from),
            None => Ok(RateWindow::new(key, policy_name)),
        }
    }

    async fn save(&self, skey: &str, window: &RateWindow) -> StorageResult<()> {
        let bytes = serde_json::to_vec(window)?;
        self.store.set(skey, bytes).await
    }
}

fn window_key(policy_name: &str, key: &str) -> String {
    storage_key(&format!("{}{}:", RATE_LIMIT_NAMESPACE, policy_name), key)
}

fn fail_open(policy: RateLimitPolicy, now: u64) -> RateLimitDecision {
    RateLimitDecision {
        allowed: true,
        remaining: policy.max_requests,
        reset_time: now.saturating_add(policy.window_ms()),
        retry_after: None,
    }
}

/// When the oldest recorded request leaves the window.
fn reset_time(window: &RateWindow, policy: RateLimitPolicy, now: u64) -> u64 {
    window
        .oldest()
        .unwrap_or(now)
        .saturating_add(policy.window_ms())
}

fn denial(window: &RateWindow, policy: RateLimitPolicy, now: u64) -> RateLimitDecision {
    let reset_time = reset_time(window, policy, now);
    RateLimitDecision {
        allowed: false,
        remaining: 0,
        reset_time,
        retry_after: Some(Duration::from_millis(reset_time.saturating_sub(now))),
    }
}
