//! Cache Entry Module
//!
//! Defines the persisted record for individual cache entries with TTL and
//! access metadata.

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single cache entry with value and metadata.
///
/// Serialized as a whole record; every write is a full overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Write timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Time to live in milliseconds
    pub ttl_ms: u64,
    /// Successful reads since the last write
    pub access_count: u64,
    /// Last successful read or write (Unix milliseconds)
    pub last_accessed: u64,
    /// Insertion order, breaks ties between equal rankings
    pub sequence: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a fresh entry stored at `now`.
    pub fn new(value: T, now: u64, ttl_ms: u64, sequence: u64) -> Self {
        Self {
            value,
            stored_at: now,
            ttl_ms,
            access_count: 0,
            last_accessed: now,
            sequence,
        }
    }

    // == Is Expired ==
    /// An entry is expired once strictly more than `ttl_ms` has elapsed
    /// since it was stored.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.stored_at) > self.ttl_ms
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed = now;
    }

    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            stored_at: self.stored_at,
            ttl_ms: self.ttl_ms,
            access_count: self.access_count,
            last_accessed: self.last_accessed,
            sequence: self.sequence,
        }
    }
}

// == Entry Metadata ==
/// The metadata half of a persisted [`CacheEntry`], decoded without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EntryMetadata {
    pub stored_at: u64,
    pub ttl_ms: u64,
    pub access_count: u64,
    pub last_accessed: u64,
    pub sequence: u64,
}

impl EntryMetadata {
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.stored_at) > self.ttl_ms
    }
}
