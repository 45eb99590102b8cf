//! Request Batcher
//!
//! Each enqueued item owns a oneshot channel; dispatch writes into every
//! channel exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::batch::BatcherConfig;
use crate::clock::duration_millis;
use crate::error::{CoordError, Result};
use crate::remote::{GroupedRemoteService, RequestKind};

type Settlement = Result<Option<Value>>;

struct BatchItem {
    id: u64,
    kind: RequestKind,
    sub_key: String,
    params: Value,
    tx: oneshot::Sender<Settlement>,
}

/// One collecting window; removed from the open list when its timer fires.
struct BatchWindow {
    id: u64,
    items: Vec<BatchItem>,
}

impl BatchWindow {
    fn count_of(&self, kind: &RequestKind) -> usize {
        self.items.iter().filter(|item| &item.kind == kind).count()
    }
}

#[derive(Default)]
struct BatcherState {
    open: Vec<BatchWindow>,
    next_window: u64,
    next_item: u64,
}

#[derive(Debug, Default)]
struct BatcherCounters {
    batches_dispatched: AtomicU64,
    items_dispatched: AtomicU64,
    item_timeouts: AtomicU64,
    group_failures: AtomicU64,
}

// == Batcher Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatcherStats {
    /// Grouped remote calls made
    pub batches_dispatched: u64,
    /// Items answered by a grouped call
    pub items_dispatched: u64,
    /// Items that hit their own deadline
    pub item_timeouts: u64,
    /// Grouped calls that failed
    pub group_failures: u64,
    /// Windows still collecting
    pub open_windows: usize,
}

struct BatcherInner {
    remote: Arc<dyn GroupedRemoteService>,
    config: BatcherConfig,
    state: Mutex<BatcherState>,
    counters: BatcherCounters,
}

// == Request Batcher ==
/// Micro-batching coalescer in front of a [`GroupedRemoteService`].
///
/// Cloning shares the same windows.
#[derive(Clone)]
pub struct RequestBatcher {
    inner: Arc<BatcherInner>,
}

impl RequestBatcher {
    pub fn new(remote: Arc<dyn GroupedRemoteService>, config: BatcherConfig) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                remote,
                config,
                state: Mutex::new(BatcherState::default()),
                counters: BatcherCounters::default(),
            }),
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.inner.config
    }

    // == Enqueue ==
    /// Queues one lookup and waits for its share of the grouped result.
    ///
    /// `Ok(None)` means the grouped call succeeded but had no entry for these
    /// params.
    pub async fn enqueue(&self, kind: RequestKind, params: Value) -> Result<Option<Value>> {
        let timeout = self.inner.config.item_timeout;
        self.enqueue_with_timeout(kind, params, timeout).await
    }

    /// [`enqueue`](Self::enqueue) with a caller-chosen deadline.
    ///
    /// A deadline that passes before dispatch removes the item from its
    /// window, so it never reaches the grouped call.
    pub async fn enqueue_with_timeout(
        &self,
        kind: RequestKind,
        params: Value,
        timeout: Duration,
    ) -> Result<Option<Value>> {
        if kind.as_str().is_empty() {
            return Err(CoordError::Validation("Request kind cannot be empty".to_string()));
        }

        let sub_key = self.inner.remote.sub_key(&kind, &params);
        let (tx, rx) = oneshot::channel();
        let item_id = self.inner.push(kind.clone(), sub_key, params, tx).await;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(settlement)) => settlement,
            Ok(Err(_)) => Err(CoordError::Internal(
                "batch dropped before settling".to_string(),
            )),
            Err(_) => {
                let removed = self.inner.withdraw(item_id).await;
                self.inner.counters.item_timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %kind, removed, "Batched item timed out");
                Err(CoordError::ItemTimeout {
                    kind: kind.to_string(),
                    timeout_ms: duration_millis(timeout),
                })
            }
        }
    }

    pub async fn stats(&self) -> BatcherStats {
        let counters = &self.inner.counters;
        BatcherStats {
            batches_dispatched: counters.batches_dispatched.load(Ordering::Relaxed),
            items_dispatched: counters.items_dispatched.load(Ordering::Relaxed),
            item_timeouts: counters.item_timeouts.load(Ordering::Relaxed),
            group_failures: counters.group_failures.load(Ordering::Relaxed),
            open_windows: self.inner.state.lock().await.open.len(),
        }
    }
}

impl BatcherInner {
    /// Appends to the first open window with room for `kind`, opening a new
    /// window (and arming its timer) when none has room.
    async fn push(
        self: &Arc<Self>,
        kind: RequestKind,
        sub_key: String,
        params: Value,
        tx: oneshot::Sender<Settlement>,
    ) -> u64 {
        let mut state = self.state.lock().await;
        let item_id = state.next_item;
        state.next_item += 1;

        let max = self.config.max_batch_size;
        let position = state.open.iter().position(|w| w.count_of(&kind) < max);
        let position = match position {
            Some(position) => position,
            None => {
                let window_id = state.next_window;
                state.next_window += 1;
                state.open.push(BatchWindow {
                    id: window_id,
                    items: Vec::new(),
                });
                self.arm_timer(window_id);
                debug!(window_id, kind = %kind, "Opened batch window");
                state.open.len() - 1
            }
        };

        state.open[position].items.push(BatchItem {
            id: item_id,
            kind,
            sub_key,
            params,
            tx,
        });
        item_id
    }

    fn arm_timer(self: &Arc<Self>, window_id: u64) {
        let inner = Arc::clone(self);
        let delay = self.config.collection_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.dispatch(window_id).await;
        });
    }

    /// Removes a still-collecting item. False once its window has dispatched.
    async fn withdraw(&self, item_id: u64) -> bool {
        let mut state = self.state.lock().await;
        for window in state.open.iter_mut() {
            if let Some(index) = window.items.iter().position(|item| item.id == item_id) {
                window.items.remove(index);
                return true;
            }
        }
        false
    }

    async fn dispatch(&self, window_id: u64) {
        let items = {
            let mut state = self.state.lock().await;
            match state.open.iter().position(|w| w.id == window_id) {
                Some(index) => state.open.remove(index).items,
                None => return,
            }
        };

        if items.is_empty() {
            debug!(window_id, "Batch window closed with no items left");
            return;
        }

        // Group by kind, keeping first-seen order
        let mut groups: Vec<(RequestKind, Vec<BatchItem>)> = Vec::new();
        for item in items {
            match groups.iter_mut().find(|(kind, _)| kind == &item.kind) {
                Some((_, group)) => group.push(item),
                None => groups.push((item.kind.clone(), vec![item])),
            }
        }

        info!(window_id, groups = groups.len(), "Dispatching batch window");
        join_all(
            groups
                .into_iter()
                .map(|(kind, items)| self.dispatch_group(kind, items)),
        )
        .await;
    }

    async fn dispatch_group(&self, kind: RequestKind, items: Vec<BatchItem>) {
        // One param set per sub-key
        let mut seen: HashMap<&str, ()> = HashMap::new();
        let params: Vec<Value> = items
            .iter()
            .filter(|item| seen.insert(item.sub_key.as_str(), ()).is_none())
            .map(|item| item.params.clone())
            .collect();

        debug!(kind = %kind, items = items.len(), unique = params.len(), "Grouped call");
        self.counters.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.counters
            .items_dispatched
            .fetch_add(items.len() as u64, Ordering::Relaxed);

        match self.remote.query_many(&kind, params).await {
            Ok(results) => {
                for item in items {
                    let _ = item.tx.send(Ok(results.get(&item.sub_key).cloned()));
                }
            }
            Err(err) => {
                warn!(kind = %kind, error = %err, "Grouped call failed");
                self.counters.group_failures.fetch_add(1, Ordering::Relaxed);
                let failure = CoordError::GroupedOperation {
                    kind: kind.to_string(),
                    message: err.to_string(),
                };
                for item in items {
                    let _ = item.tx.send(Err(failure.clone()));
                }
            }
        }
    }
}
