//! Retention service for time-based session purge.
//!
//! Runs as a background task deleting terminal sessions whose
//! `completed_at` is older than `retention_days`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::orchestrator::session_manager::SessionManager;

/// Spawn the retention purge background task.
///
/// On each tick the session manager drops terminal sessions that have
/// been finished for longer than `retention_days`.
#[must_use]
pub fn spawn_retention_task(
    manager: Arc<SessionManager>,
    retention_days: u32,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match manager.cleanup_old_sessions(retention_days).await {
                        Ok(removed) if removed > 0 => {
                            info!(removed, retention_days, "retention purge completed");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            error!(%err, "retention purge failed");
                        }
                    }
                }
            }
        }
    })
}
