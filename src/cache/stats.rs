//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Counters ==
/// Process-lifetime counters, updated without locking.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds a snapshot with the given storage-derived figures.
    pub fn snapshot(&self, entry_count: usize, total_size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count,
            total_size,
        }
    }
}

// == Cache Stats ==
/// Point-in-time cache statistics for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, expired or unreadable)
    pub misses: u64,
    /// Number of entries removed by eviction passes
    pub evictions: u64,
    /// Number of entries removed because a read found them expired
    pub expirations: u64,
    /// Current number of persisted entries
    pub entry_count: usize,
    /// Approximate persisted size in bytes
    pub total_size: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheCounters::new().snapshot(0, 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let counters = CacheCounters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();

        let stats = counters.snapshot(3, 120);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.total_size, 120);
    }

    #[test]
    fn test_record_evictions_and_expirations() {
        let counters = CacheCounters::new();
        counters.record_evictions(2);
        counters.record_evictions(3);
        counters.record_expiration();

        let stats = counters.snapshot(0, 0);
        assert_eq!(stats.evictions, 5);
        assert_eq!(stats.expirations, 1);
    }
}
