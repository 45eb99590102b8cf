//! Rate limit policies.

use std::collections::HashMap;
use std::time::Duration;

use crate::clock::duration_millis;

pub const AUTH: &str = "auth";
pub const MESSAGING: &str = "messaging";
pub const PROFILE_UPDATE: &str = "profile_update";
pub const SEARCH: &str = "search";
pub const MEDIA_UPLOAD: &str = "media_upload";
pub const API: &str = "api";

// == Rate Limit Policy ==
/// At most `max_requests` within any trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Window length in milliseconds, saturating for windows past `u64::MAX` ms.
    pub fn window_ms(&self) -> u64 {
        duration_millis(self.window)
    }
}

// == Policy Override ==
/// Per-call replacement for some or all of a named policy's parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOverride {
    pub max_requests: Option<u32>,
    pub window: Option<Duration>,
}

impl PolicyOverride {
    pub fn apply(&self, policy: RateLimitPolicy) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.max_requests.unwrap_or(policy.max_requests),
            window: self.window.unwrap_or(policy.window),
        }
    }
}

// == Policy Table ==
/// Named policies, looked up per check.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<String, RateLimitPolicy>,
}

impl PolicyTable {
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, policy: RateLimitPolicy) {
        self.policies.insert(name.into(), policy);
    }

    pub fn get(&self, name: &str) -> Option<RateLimitPolicy> {
        self.policies.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        let minute = Duration::from_secs(60);
        let mut table = Self::empty();
        table.insert(AUTH, RateLimitPolicy::new(3, Duration::from_secs(5 * 60)));
        table.insert(MESSAGING, RateLimitPolicy::new(20, minute));
        table.insert(PROFILE_UPDATE, RateLimitPolicy::new(10, minute));
        table.insert(SEARCH, RateLimitPolicy::new(30, minute));
        table.insert(MEDIA_UPLOAD, RateLimitPolicy::new(5, minute));
        table.insert(API, RateLimitPolicy::new(100, minute));
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = PolicyTable::default();
        assert_eq!(
            table.get(AUTH),
            Some(RateLimitPolicy::new(3, Duration::from_secs(300)))
        );
        assert_eq!(
            table.get(MESSAGING),
            Some(RateLimitPolicy::new(20, Duration::from_secs(60)))
        );
        assert_eq!(table.get("unknown"), None);
        assert_eq!(table.names().count(), 6);
    }

    #[test]
    fn test_override_partial() {
        let base = RateLimitPolicy::new(20, Duration::from_secs(60));
        let overridden = PolicyOverride {
            max_requests: Some(5),
            window: None,
        }
        .apply(base);

        assert_eq!(overridden, RateLimitPolicy::new(5, Duration::from_secs(60)));
        assert_eq!(PolicyOverride::default().apply(base), base);
    }

    #[test]
    fn test_window_ms_saturates_for_huge_windows() {
        let policy = RateLimitPolicy::new(1, Duration::from_secs(18_446_744_073_709_552));
        assert_eq!(policy.window_ms(), u64::MAX);
        assert_eq!(RateLimitPolicy::new(1, Duration::from_secs(60)).window_ms(), 60_000);
    }
}
