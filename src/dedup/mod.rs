//! Request Deduplication Module
//!
//! Coalesces concurrent identical requests onto one in-flight operation.

mod deduplicator;

pub use deduplicator::{DedupConfig, DedupStats, RequestDeduplicator};
