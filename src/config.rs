//! Configuration Module
//!
//! Loads server and component configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::batch::BatcherConfig;
use crate::cache::{CacheConfig, EvictionPolicy};
use crate::dedup::DedupConfig;
use crate::rate_limit::RateLimiterConfig;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub cache_max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub cache_default_ttl: u64,
    /// Cache victim ranking
    pub cache_eviction: EvictionPolicy,
    /// Batch collection window in milliseconds
    pub batch_delay_ms: u64,
    /// Most items of one kind per batch window
    pub batch_max_size: usize,
    /// Default per-item batch deadline in milliseconds
    pub batch_item_timeout_ms: u64,
    /// Age in milliseconds after which a pending dedup entry is replaced
    pub dedup_timeout_ms: u64,
    /// Idle rate windows older than this many seconds are cleaned up
    pub rate_limit_retention_secs: u64,
    /// Rate window cleanup interval in seconds
    pub rate_limit_cleanup_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_EVICTION` - `lru` or `lfu` (default: lru)
    /// - `BATCH_DELAY_MS` - Batch collection window (default: 50)
    /// - `BATCH_MAX_SIZE` - Items per kind per window (default: 20)
    /// - `BATCH_ITEM_TIMEOUT_MS` - Per-item deadline (default: 5000)
    /// - `DEDUP_TIMEOUT_MS` - Pending request lifetime (default: 30000)
    /// - `RATE_LIMIT_RETENTION_SECS` - Idle window retention (default: 3600)
    /// - `RATE_LIMIT_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache_default_ttl),
            cache_eviction: env::var("CACHE_EVICTION")
                .ok()
                .and_then(|v| EvictionPolicy::parse(&v))
                .unwrap_or(defaults.cache_eviction),
            batch_delay_ms: env_or("BATCH_DELAY_MS", defaults.batch_delay_ms),
            batch_max_size: env_or("BATCH_MAX_SIZE", defaults.batch_max_size),
            batch_item_timeout_ms: env_or("BATCH_ITEM_TIMEOUT_MS", defaults.batch_item_timeout_ms),
            dedup_timeout_ms: env_or("DEDUP_TIMEOUT_MS", defaults.dedup_timeout_ms),
            rate_limit_retention_secs: env_or(
                "RATE_LIMIT_RETENTION_SECS",
                defaults.rate_limit_retention_secs,
            ),
            rate_limit_cleanup_interval: env_or(
                "RATE_LIMIT_CLEANUP_INTERVAL",
                defaults.rate_limit_cleanup_interval,
            ),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache_max_entries,
            default_ttl: Duration::from_secs(self.cache_default_ttl),
            eviction: self.cache_eviction,
        }
    }

    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig::new()
            .with_collection_delay(Duration::from_millis(self.batch_delay_ms))
            .with_item_timeout(Duration::from_millis(self.batch_item_timeout_ms))
            .with_max_batch_size(self.batch_max_size)
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            timeout: Duration::from_millis(self.dedup_timeout_ms),
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            retention: Duration::from_secs(self.rate_limit_retention_secs),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cleanup_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_max_entries: 1000,
            cache_default_ttl: 300,
            cache_eviction: EvictionPolicy::LeastRecentlyAccessed,
            batch_delay_ms: 50,
            batch_max_size: 20,
            batch_item_timeout_ms: 5000,
            dedup_timeout_ms: 30_000,
            rate_limit_retention_secs: 3600,
            rate_limit_cleanup_interval: 300,
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.cache_default_ttl, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.rate_limit_cleanup_interval, 300);
        assert_eq!(config.cache_eviction, EvictionPolicy::LeastRecentlyAccessed);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "CACHE_MAX_ENTRIES",
            "CACHE_DEFAULT_TTL",
            "CACHE_EVICTION",
            "BATCH_DELAY_MS",
            "BATCH_MAX_SIZE",
            "BATCH_ITEM_TIMEOUT_MS",
            "DEDUP_TIMEOUT_MS",
            "RATE_LIMIT_RETENTION_SECS",
            "RATE_LIMIT_CLEANUP_INTERVAL",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.batch_delay_ms, 50);
        assert_eq!(config.dedup_timeout_ms, 30_000);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_component_configs() {
        let config = Config {
            batch_max_size: 0,
            ..Config::default()
        };

        let cache = config.cache_config();
        assert_eq!(cache.max_entries, 1000);
        assert_eq!(cache.default_ttl, Duration::from_secs(300));

        let batcher = config.batcher_config();
        assert_eq!(batcher.collection_delay, Duration::from_millis(50));
        assert_eq!(batcher.item_timeout, Duration::from_secs(5));
        assert_eq!(batcher.max_batch_size, 1);

        assert_eq!(config.dedup_config().timeout, Duration::from_secs(30));
        assert_eq!(
            config.rate_limiter_config().retention,
            Duration::from_secs(3600)
        );
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
    }
}
