//! Cache Store Module
//!
//! TTL cache over a persisted [`KvStore`], with batched LRU or LFU eviction and
//! read-time expiry. Storage failures never reach the caller: reads degrade to
//! misses and writes to no-ops.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{
    eviction_count, select_victims, CacheCounters, CacheEntry, CacheStats, EntryMetadata,
    EvictionPolicy, CACHE_NAMESPACE,
};
use crate::clock::{duration_millis, Clock};
use crate::error::{validate_key, CoordError, Result};
use crate::storage::{storage_key, KvStore, StorageResult};

// == Cache Config ==
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// TTL used by [`CacheStore::set_default`]
    pub default_ttl: Duration,
    /// Victim ranking for this instance
    pub eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(300),
            eviction: EvictionPolicy::LeastRecentlyAccessed,
        }
    }
}

/// Outcome of decoding one persisted record at read time.
enum Lookup {
    Valid(CacheEntry<Value>),
    Expired,
    Corrupt,
}

fn classify(bytes: &[u8], now: u64) -> Lookup {
    match serde_json::from_slice::<CacheEntry<Value>>(bytes) {
        Ok(entry) if entry.is_expired(now) => Lookup::Expired,
        Ok(entry) => Lookup::Valid(entry),
        Err(_) => Lookup::Corrupt,
    }
}

fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(CoordError::Validation("TTL must be greater than zero".to_string()));
    }
    Ok(())
}

// == Cache Store ==
/// Persisted cache with bounded size, TTL expiry and batched eviction.
pub struct CacheStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    counters: CacheCounters,
    sequence: AtomicU64,
    /// Serializes the eviction check with the writes that follow it.
    write_lock: Mutex<()>,
}

impl CacheStore {
    // == Constructor ==
    /// A `max_entries` of zero is raised to one.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, mut config: CacheConfig) -> Self {
        if config.max_entries == 0 {
            warn!("Cache max_entries of 0 raised to 1");
            config.max_entries = 1;
        }

        Self {
            store,
            clock,
            config,
            counters: CacheCounters::new(),
            sequence: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Get ==
    /// Returns the value stored under `key`, or `None` when absent, expired,
    /// unreadable or of a different shape than `T`.
    ///
    /// A hit rewrites the entry with bumped access metadata.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        let skey = storage_key(CACHE_NAMESPACE, key);
        let now = self.clock.now_millis();

        let bytes = match self.store.get(&skey).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.counters.record_miss();
                return Ok(None);
            }
            Err(err) => {
                warn!(key, error = %err, "Cache read failed, treating as miss");
                self.counters.record_miss();
                return Ok(None);
            }
        };

        let mut entry = match classify(&bytes, now) {
            Lookup::Valid(entry) => entry,
            Lookup::Expired => {
                debug!(key, "Cache entry expired, removing");
                self.counters.record_expiration();
                self.counters.record_miss();
                self.remove_quietly(&skey).await;
                return Ok(None);
            }
            Lookup::Corrupt => {
                warn!(key, "Cache entry unreadable, removing");
                self.counters.record_miss();
                self.remove_quietly(&skey).await;
                return Ok(None);
            }
        };

        let value = match serde_json::from_value::<T>(entry.value.clone()) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "Cached value has unexpected shape");
                self.counters.record_miss();
                return Ok(None);
            }
        };

        entry.touch(now);
        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                if let Err(err) = self.persist_touched(vec![(skey, bytes)]).await {
                    warn!(key, error = %err, "Failed to persist access metadata");
                }
            }
            Err(err) => warn!(key, error = %err, "Failed to encode access metadata"),
        }

        self.counters.record_hit();
        Ok(Some(value))
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`, replacing any existing entry.
    ///
    /// A new key arriving at a full store first triggers an eviction pass.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        validate_key(key)?;
        validate_ttl(ttl)?;

        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "Value not serializable, skipping cache write");
                return Ok(());
            }
        };

        let skey = storage_key(CACHE_NAMESPACE, key);
        if let Err(err) = self.write_entries(vec![(skey, value)], ttl).await {
            warn!(key, error = %err, "Cache write failed, skipping");
        }
        Ok(())
    }

    /// [`set`](Self::set) with the configured default TTL.
    pub async fn set_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, value, self.config.default_ttl).await
    }

    // == Delete ==
    /// Removes `key`. Missing keys are not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.remove_quietly(&storage_key(CACHE_NAMESPACE, key)).await;
        Ok(())
    }

    // == Clear ==
    /// Removes every cache entry.
    pub async fn clear(&self) {
        let result = async {
            let keys = self.store.list_keys(CACHE_NAMESPACE).await?;
            self.store.multi_delete(&keys).await
        }
        .await;

        if let Err(err) = result {
            warn!(error = %err, "Cache clear failed");
        }
    }

    // == Batch Get ==
    /// Returns only the present, unexpired keys. Expired entries found along
    /// the way are deleted, as with [`get`](Self::get).
    pub async fn batch_get<T: DeserializeOwned>(&self, keys: &[&str]) -> Result<HashMap<String, T>> {
        for key in keys {
            validate_key(key)?;
        }

        let skeys: Vec<String> = keys.iter().map(|k| storage_key(CACHE_NAMESPACE, k)).collect();
        let now = self.clock.now_millis();

        let raw = match self.store.multi_get(&skeys).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(count = keys.len(), error = %err, "Cache batch read failed, treating as misses");
                for _ in keys {
                    self.counters.record_miss();
                }
                return Ok(HashMap::new());
            }
        };

        let mut found = HashMap::new();
        let mut stale = Vec::new();
        let mut touched = Vec::new();

        for ((key, skey), bytes) in keys.iter().zip(skeys).zip(raw) {
            let Some(bytes) = bytes else {
                self.counters.record_miss();
                continue;
            };

            match classify(&bytes, now) {
                Lookup::Valid(mut entry) => match serde_json::from_value::<T>(entry.value.clone()) {
                    Ok(value) => {
                        entry.touch(now);
                        if let Ok(bytes) = serde_json::to_vec(&entry) {
                            touched.push((skey, bytes));
                        }
                        self.counters.record_hit();
                        found.insert(key.to_string(), value);
                    }
                    Err(err) => {
                        warn!(key, error = %err, "Cached value has unexpected shape");
                        self.counters.record_miss();
                    }
                },
                Lookup::Expired => {
                    self.counters.record_expiration();
                    self.counters.record_miss();
                    stale.push(skey);
                }
                Lookup::Corrupt => {
                    self.counters.record_miss();
                    stale.push(skey);
                }
            }
        }

        if !stale.is_empty() {
            debug!(count = stale.len(), "Removing expired entries found by batch read");
            if let Err(err) = self.store.multi_delete(&stale).await {
                warn!(error = %err, "Failed to remove expired entries");
            }
        }
        if !touched.is_empty() {
            if let Err(err) = self.persist_touched(touched).await {
                warn!(error = %err, "Failed to persist access metadata");
            }
        }

        Ok(found)
    }

    // == Batch Set ==
    /// Writes every entry with one shared TTL after a single eviction check.
    ///
    /// Not transactional: if the backend fails part way through, entries
    /// written before the failure stay written. Entries beyond `max_entries`
    /// in one call are dropped.
    pub async fn batch_set<T: Serialize>(&self, entries: Vec<(String, T)>, ttl: Duration) -> Result<()> {
        for (key, _) in &entries {
            validate_key(key)?;
        }
        validate_ttl(ttl)?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::to_value(&value) {
                Ok(value) => records.push((storage_key(CACHE_NAMESPACE, &key), value)),
                Err(err) => warn!(key = %key, error = %err, "Value not serializable, skipping"),
            }
        }

        if records.len() > self.config.max_entries {
            warn!(
                requested = records.len(),
                max_entries = self.config.max_entries,
                "Batch larger than cache capacity, truncating"
            );
            records.truncate(self.config.max_entries);
        }

        if let Err(err) = self.write_entries(records, ttl).await {
            warn!(error = %err, "Cache batch write failed, skipping");
        }
        Ok(())
    }

    // == Invalidate Prefix ==
    /// Removes every entry whose key starts with `prefix`. Returns the count.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        validate_key(prefix)?;
        let result = async {
            let keys = self.store.list_keys(&storage_key(CACHE_NAMESPACE, prefix)).await?;
            self.store.multi_delete(&keys).await?;
            StorageResult::Ok(keys.len())
        }
        .await;

        match result {
            Ok(count) => {
                debug!(prefix, count, "Invalidated cache entries by prefix");
                Ok(count)
            }
            Err(err) => {
                warn!(prefix, error = %err, "Prefix invalidation failed");
                Ok(0)
            }
        }
    }

    // == Purge Expired ==
    /// Removes every expired or unreadable entry. Returns the count.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let result = async {
            let keys = self.store.list_keys(CACHE_NAMESPACE).await?;
            let raw = self.store.multi_get(&keys).await?;
            let stale: Vec<String> = keys
                .into_iter()
                .zip(raw)
                .filter_map(|(key, bytes)| {
                    let bytes = bytes?;
                    match classify(&bytes, now) {
                        Lookup::Valid(_) => None,
                        Lookup::Expired | Lookup::Corrupt => Some(key),
                    }
                })
                .collect();
            self.store.multi_delete(&stale).await?;
            StorageResult::Ok(stale.len())
        }
        .await;

        match result {
            Ok(count) => {
                for _ in 0..count {
                    self.counters.record_expiration();
                }
                count
            }
            Err(err) => {
                warn!(error = %err, "Expired entry purge failed");
                0
            }
        }
    }

    // == Stats ==
    /// Returns current statistics. Storage figures read as zero when the
    /// backend is unavailable.
    pub async fn stats(&self) -> CacheStats {
        let footprint = async {
            let keys = self.store.list_keys(CACHE_NAMESPACE).await?;
            let raw = self.store.multi_get(&keys).await?;
            let size: usize = raw.iter().flatten().map(|bytes| bytes.len()).sum();
            StorageResult::Ok((keys.len(), size))
        }
        .await;

        let (entry_count, total_size) = footprint.unwrap_or_else(|err| {
            warn!(error = %err, "Cache stats unavailable from storage");
            (0, 0)
        });
        self.counters.snapshot(entry_count, total_size)
    }

    // == Length ==
    /// Returns the current number of persisted entries.
    pub async fn len(&self) -> usize {
        self.stats().await.entry_count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn remove_quietly(&self, skey: &str) {
        if let Err(err) = self.store.delete(skey).await {
            warn!(key = skey, error = %err, "Cache delete failed");
        }
    }

    /// Evicts if the incoming new keys would overflow the bound, then writes.
    async fn write_entries(&self, records: Vec<(String, Value)>, ttl: Duration) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let existing = self.store.list_keys(CACHE_NAMESPACE).await?;
        let existing_set: HashSet<&String> = existing.iter().collect();
        let new_keys: HashSet<&String> = records
            .iter()
            .map(|(skey, _)| skey)
            .filter(|skey| !existing_set.contains(skey))
            .collect();

        let projected = existing.len() + new_keys.len();
        if !new_keys.is_empty() && projected > self.config.max_entries {
            let overflow = projected - self.config.max_entries;
            let count = eviction_count(existing.len()).max(overflow);
            self.evict(existing, count).await?;
        }

        let now = self.clock.now_millis();
        let ttl_ms = duration_millis(ttl);
        let mut encoded = Vec::with_capacity(records.len());
        for (skey, value) in records {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
            let entry = CacheEntry::new(value, now, ttl_ms, sequence);
            encoded.push((skey, serde_json::to_vec(&entry)?));
        }

        self.store.multi_set(encoded).await
    }

    /// Rewrites entries after a hit, skipping any evicted or deleted since
    /// they were read.
    async fn persist_touched(&self, records: Vec<(String, Vec<u8>)>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let skeys: Vec<String> = records.iter().map(|(skey, _)| skey.clone()).collect();
        let present = self.store.multi_get(&skeys).await?;
        let still_present: Vec<(String, Vec<u8>)> = records
            .into_iter()
            .zip(present)
            .filter_map(|(record, current)| current.map(|_| record))
            .collect();

        if still_present.is_empty() {
            return Ok(());
        }
        self.store.multi_set(still_present).await
    }

    async fn evict(&self, keys: Vec<String>, count: usize) -> StorageResult<()> {
        let raw = self.store.multi_get(&keys).await?;
        let candidates: Vec<(String, Option<EntryMetadata>)> = keys
            .into_iter()
            .zip(raw)
            .filter_map(|(key, bytes)| {
                let bytes = bytes?;
                Some((key, serde_json::from_slice::<EntryMetadata>(&bytes).ok()))
            })
            .collect();

        let victims = select_victims(candidates, self.config.eviction, count);
        self.store.multi_delete(&victims).await?;
        self.counters.record_evictions(victims.len() as u64);
        debug!(evicted = victims.len(), policy = ?self.config.eviction, "Cache eviction pass");
        Ok(())
    }
}
