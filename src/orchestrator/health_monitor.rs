//! Periodic health-check driver for the worker pool.
//!
//! The coordinator's [`check_worker_health`] sweep has no scheduling of
//! its own; this task ticks it on an interval until cancelled.
//!
//! [`check_worker_health`]: crate::orchestrator::worker_coordinator::WorkerCoordinator::check_worker_health

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::worker_coordinator::WorkerCoordinator;

/// Spawn the health-monitor background task.
///
/// On each tick the worker pool is swept for stale heartbeats; demotions
/// are logged with the affected worker ids.
#[must_use]
pub fn spawn_health_monitor(
    coordinator: Arc<WorkerCoordinator>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("health monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let demoted = coordinator.check_worker_health().await;
                    if !demoted.is_empty() {
                        warn!(count = demoted.len(), workers = ?demoted, "health sweep demoted workers");
                    }
                }
            }
        }
    })
}
