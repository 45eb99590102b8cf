//! Batcher configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// How long a window collects items before dispatching
    pub collection_delay: Duration,
    /// Default per-item deadline
    pub item_timeout: Duration,
    /// Most items of one kind a single window holds
    pub max_batch_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            collection_delay: Duration::from_millis(50),
            item_timeout: Duration::from_secs(5),
            max_batch_size: 20,
        }
    }
}

impl BatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection_delay(mut self, delay: Duration) -> Self {
        self.collection_delay = delay;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }
}
