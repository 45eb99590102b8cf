//! Request Deduplicator
//!
//! One pending operation per key; callers arriving while it is in flight
//! attach to the same shared future instead of starting their own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{duration_millis, Clock};
use crate::error::{validate_key, CoordError, Result};

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

// == Dedup Config ==
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Age after which a pending entry is no longer joined
    pub timeout: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

// == Dedup Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupStats {
    /// Operations actually started
    pub started: u64,
    /// Callers attached to an operation someone else started
    pub joined: u64,
    /// Pending entries discarded for being older than the timeout
    pub stale_replaced: u64,
    /// Keys currently in flight
    pub pending: usize,
}

struct PendingRequest<T> {
    started_at: u64,
    /// Distinguishes this registration from a later one under the same key
    generation: u64,
    shared: SharedResult<T>,
}

#[derive(Debug, Default)]
struct DedupCounters {
    started: AtomicU64,
    joined: AtomicU64,
    stale_replaced: AtomicU64,
}

// == Request Deduplicator ==
/// Shares one in-flight operation across concurrent callers with the same key.
///
/// Keys must encode the full identity of the operation: two different
/// requests under the same key silently share a result.
pub struct RequestDeduplicator<T> {
    pending: Arc<Mutex<HashMap<String, PendingRequest<T>>>>,
    clock: Arc<dyn Clock>,
    config: DedupConfig,
    next_generation: AtomicU64,
    counters: DedupCounters,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(clock: Arc<dyn Clock>, config: DedupConfig) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            clock,
            config,
            next_generation: AtomicU64::new(0),
            counters: DedupCounters::default(),
        }
    }

    // == Run ==
    /// Runs `operation` under `key`, or joins the one already in flight.
    ///
    /// `operation` is only invoked when no fresh pending entry exists, and
    /// then runs on its own task. The entry is dropped as soon as the
    /// operation settles, success or failure, whether or not anyone still
    /// awaits it.
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        validate_key(key)?;
        let timeout_ms = duration_millis(self.config.timeout);

        let shared = {
            let mut pending = self.pending.lock().await;
            let now = self.clock.now_millis();

            let fresh = pending
                .get(key)
                .filter(|p| now.saturating_sub(p.started_at) <= timeout_ms)
                .map(|p| p.shared.clone());

            match fresh {
                Some(shared) => {
                    self.counters.joined.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "Joining in-flight request");
                    shared
                }
                None => {
                    if pending.contains_key(key) {
                        self.counters.stale_replaced.fetch_add(1, Ordering::Relaxed);
                        debug!(key, "Discarding stale in-flight request");
                    }

                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let shared = self.register(key, generation, operation());
                    pending.insert(
                        key.to_string(),
                        PendingRequest {
                            started_at: now,
                            generation,
                            shared: shared.clone(),
                        },
                    );
                    self.counters.started.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "Started request");
                    shared
                }
            }
        };

        shared.await
    }

    /// Spawns `fut` so that it settles, and removes its own registration,
    /// even when every caller has gone away. A newer generation under the
    /// same key is left alone.
    fn register<Fut>(&self, key: &str, generation: u64, fut: Fut) -> SharedResult<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        let key = key.to_string();

        let handle = tokio::spawn(async move {
            let result = fut.await;
            let mut pending = pending.lock().await;
            if pending.get(&key).map(|p| p.generation) == Some(generation) {
                pending.remove(&key);
            }
            result
        });

        async move {
            handle.await.unwrap_or_else(|err| {
                Err(CoordError::Internal(format!("Deduplicated operation aborted: {}", err)))
            })
        }
        .boxed()
        .shared()
    }

    // == Remove ==
    /// Stops future callers from joining the operation under `key`.
    /// The operation itself keeps running for those already attached.
    pub async fn remove(&self, key: &str) -> bool {
        self.pending.lock().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.pending.lock().await.clear();
    }

    pub async fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().await.contains_key(key)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn stats(&self) -> DedupStats {
        DedupStats {
            started: self.counters.started.load(Ordering::Relaxed),
            joined: self.counters.joined.load(Ordering::Relaxed),
            stale_replaced: self.counters.stale_replaced.load(Ordering::Relaxed),
            pending: self.pending_count().await,
        }
    }
}
