//! Rate Window Cleanup Task
//!
//! Background task that periodically drops idle rate windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;

/// Spawns a background task that runs [`RateLimiter::cleanup`] every `interval`.
///
/// The first sweep happens one full interval after spawning. The returned
/// handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(limiter.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting rate window cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = limiter.cleanup().await;
            if removed > 0 {
                info!("Rate window cleanup: removed {} idle windows", removed);
            } else {
                debug!("Rate window cleanup: no idle windows found");
            }
        }
    })
}
