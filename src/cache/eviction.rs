//! Eviction Module
//!
//! Approximate LRU: when the store is full, rank every entry and drop the
//! bottom fifth in one pass instead of one entry per insertion.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cache::EntryMetadata;

/// Share of entries removed per eviction pass, in percent.
pub const EVICTION_PERCENT: usize = 20;

// == Eviction Policy ==
/// Ranking used to pick victims. Fixed per cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest `last_accessed` first
    #[default]
    LeastRecentlyAccessed,
    /// Lowest `access_count` first, then oldest access
    LeastFrequentlyAccessed,
}

impl EvictionPolicy {
    /// Parses `lru` / `lfu` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "lru" => Some(Self::LeastRecentlyAccessed),
            "lfu" => Some(Self::LeastFrequentlyAccessed),
            _ => None,
        }
    }

    fn compare(&self, a: &EntryMetadata, b: &EntryMetadata) -> Ordering {
        let primary = match self {
            Self::LeastRecentlyAccessed => a.last_accessed.cmp(&b.last_accessed),
            Self::LeastFrequentlyAccessed => a
                .access_count
                .cmp(&b.access_count)
                .then(a.last_accessed.cmp(&b.last_accessed)),
        };
        primary.then(a.sequence.cmp(&b.sequence))
    }
}

// == Eviction Count ==
/// Number of entries to drop from a store holding `len` entries:
/// 20% rounded up, never less than one.
pub fn eviction_count(len: usize) -> usize {
    (len * EVICTION_PERCENT).div_ceil(100).max(1)
}

// == Select Victims ==
/// Picks `count` keys to evict from `candidates`.
///
/// Candidates whose metadata could not be decoded (`None`) go first; the rest
/// are ranked by `policy` with insertion order as the tiebreaker.
pub fn select_victims(
    mut candidates: Vec<(String, Option<EntryMetadata>)>,
    policy: EvictionPolicy,
    count: usize,
) -> Vec<String> {
    candidates.sort_by(|(_, a), (_, b)| match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => policy.compare(a, b),
    });

    candidates
        .into_iter()
        .take(count)
        .map(|(key, _)| key)
        .collect()
}
