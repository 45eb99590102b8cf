//! Request Batching Module
//!
//! Collects small lookups issued within a short window and dispatches them
//! as one grouped remote call per kind.
//!
//! # Cycle
//! - **Idle → Collecting**: the first item opens a window and arms its timer
//! - **Collecting → Dispatching**: the timer fires; items are grouped by kind
//! - **Dispatching → Idle**: every group is answered; the window is gone
//!
//! A window holds at most `max_batch_size` items per kind. Overflow opens a
//! further window with its own timer.

mod batcher;
mod config;

pub use batcher::{BatcherStats, RequestBatcher};
pub use config::BatcherConfig;
