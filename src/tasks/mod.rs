//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Rate window cleanup: removes windows idle past the retention horizon

mod cleanup;

pub use cleanup::spawn_cleanup_task;
