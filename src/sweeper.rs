//! Retention sweeping
//!
//! A background task that periodically purges old terminal job records
//! so historical output buffers do not grow without bound. Running and
//! pending jobs are never touched, no matter how old.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::JobRegistry;

/// Spawn the periodic retention sweeper
pub fn spawn_sweeper(
    registry: Arc<JobRegistry>,
    interval: Duration,
    retention_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            retention_seconds, "Retention sweeper started"
        );
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh start
        // does not race newly submitted jobs for no benefit.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = registry.cleanup(retention_seconds).await;
            if removed > 0 {
                debug!(removed, "Sweep removed old job records");
            }
        }
    })
}
