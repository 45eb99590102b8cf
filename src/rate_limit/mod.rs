//! Rate Limiting Module
//!
//! Sliding-window admission control per (policy, key) pair. Each admitted
//! request is recorded as an instant; a request is admitted while fewer than
//! `max_requests` instants fall inside the trailing window.

mod limiter;
mod policy;
mod window;


pub use limiter::{
    RateLimitDecision, RateLimiter, RateLimiterConfig, RateLimiterStats, RATE_LIMIT_NAMESPACE,
    SUSPICIOUS_ACTIVITY_POLICIES,
};
pub use policy::{
    PolicyOverride, PolicyTable, RateLimitPolicy, API, AUTH, MEDIA_UPLOAD, MESSAGING,
    PROFILE_UPDATE, SEARCH,
};
pub use window::RateWindow;
