//! Coordinator Module
//!
//! One context object holding the cache, deduplicator, batcher and rate
//! limiter, built once at startup and handed to call sites.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::RequestBatcher;
use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::config::Config;
use crate::dedup::RequestDeduplicator;
use crate::error::{CoordError, Result};
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::remote::{GroupedRemoteService, RemoteDataService, RequestKind};
use crate::storage::KvStore;

// == Coordinator ==
#[derive(Clone)]
pub struct Coordinator {
    cache: Arc<CacheStore>,
    dedup: Arc<RequestDeduplicator<Value>>,
    batcher: RequestBatcher,
    limiter: Arc<RateLimiter>,
    remote: Arc<dyn RemoteDataService>,
}

impl Coordinator {
    /// Builds every component from `config`. The cache and rate limiter share
    /// `store`.
    pub fn new(
        config: &Config,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        remote: Arc<dyn RemoteDataService>,
        grouped: Arc<dyn GroupedRemoteService>,
    ) -> Self {
        Self {
            cache: Arc::new(CacheStore::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.cache_config(),
            )),
            dedup: Arc::new(RequestDeduplicator::new(
                Arc::clone(&clock),
                config.dedup_config(),
            )),
            batcher: RequestBatcher::new(grouped, config.batcher_config()),
            limiter: Arc::new(RateLimiter::new(store, clock, config.rate_limiter_config())),
            remote,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn dedup(&self) -> &Arc<RequestDeduplicator<Value>> {
        &self.dedup
    }

    pub fn batcher(&self) -> &RequestBatcher {
        &self.batcher
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    // == Fetch ==
    /// Cached, deduplicated single lookup.
    ///
    /// A cache hit returns without touching the remote service. On a miss,
    /// concurrent callers with the same `kind` and `params` share one remote
    /// `query`, and a successful result is cached for `ttl`.
    pub async fn fetch(&self, kind: RequestKind, params: Value, ttl: Duration) -> Result<Value> {
        let key = request_key(&kind, &params);

        if let Some(value) = self.cache.get::<Value>(&key).await? {
            debug!(key = %key, "Served from cache");
            return Ok(value);
        }

        let remote = Arc::clone(&self.remote);
        let value = self
            .dedup
            .run(&key, move || async move {
                remote
                    .query(&kind, &params)
                    .await
                    .map_err(|err| CoordError::Remote(err.message))
            })
            .await?;

        if let Err(err) = self.cache.set(&key, &value, ttl).await {
            warn!(key = %key, error = %err, "Fetched value not cached");
        }
        Ok(value)
    }

    /// Lookup through the batcher. `Ok(None)` means not found.
    pub async fn fetch_batched(&self, kind: RequestKind, params: Value) -> Result<Option<Value>> {
        self.batcher.enqueue(kind, params).await
    }

    /// Rate-limit check for `key` under `policy`.
    pub async fn guard(&self, key: &str, policy: &str) -> Result<RateLimitDecision> {
        self.limiter.check(key, policy).await
    }
}

/// Cache and dedup key for one lookup: the kind plus the full params.
pub fn request_key(kind: &RequestKind, params: &Value) -> String {
    format!("{}:{}", kind, params)
}
