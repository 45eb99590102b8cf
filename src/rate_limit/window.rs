//! Persisted sliding window of admitted request instants.

use serde::{Deserialize, Serialize};

// == Rate Window ==
/// Admitted request instants (Unix milliseconds) for one (policy, key) pair,
/// oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    pub key: String,
    pub policy_name: String,
    pub timestamps: Vec<u64>,
}

impl RateWindow {
    pub fn new(key: impl Into<String>, policy_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            policy_name: policy_name.into(),
            timestamps: Vec::new(),
        }
    }

    /// Drops instants older than `now - window_ms`.
    pub fn prune(&mut self, now: u64, window_ms: u64) {
        let cutoff = now.saturating_sub(window_ms);
        self.timestamps.retain(|&ts| ts >= cutoff);
    }

    pub fn record(&mut self, now: u64) {
        self.timestamps.push(now);
    }

    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.iter().copied().min()
    }

    pub fn newest(&self) -> Option<u64> {
        self.timestamps.iter().copied().max()
    }

    /// True when nothing in the window is at or after `horizon`.
    pub fn is_stale(&self, horizon: u64) -> bool {
        self.newest().map_or(true, |ts| ts < horizon)
    }
}
