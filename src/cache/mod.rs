//! Cache Module
//!
//! Persisted caching with TTL expiration and batched LRU or LFU eviction.

mod entry;
mod eviction;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, EntryMetadata};
pub use eviction::{eviction_count, select_victims, EvictionPolicy, EVICTION_PERCENT};
pub use stats::{CacheCounters, CacheStats};
pub use store::{CacheConfig, CacheStore};

// == Public Constants ==
/// Storage namespace for cache records
pub const CACHE_NAMESPACE: &str = "cache:";
