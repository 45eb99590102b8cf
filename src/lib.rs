//! Request Coordinator - client-side request coordination core
//!
//! A TTL cache, an in-flight request deduplicator, a micro-batching request
//! coalescer and a sliding-window rate limiter, written against a persisted
//! key-value store and a remote data service.

pub mod api;
pub mod batch;
pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod remote;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{CoordError, Result};
pub use tasks::spawn_cleanup_task;
