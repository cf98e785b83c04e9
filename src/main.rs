#![forbid(unsafe_code)]

//! `taskgrid` — scheduler daemon binary.
//!
//! Bootstraps configuration, restores the session snapshot, constructs
//! the session manager and worker coordinator, and runs the periodic
//! health-check and retention drivers until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use taskgrid::config::GlobalConfig;
use taskgrid::orchestrator::health_monitor;
use taskgrid::orchestrator::session_manager::SessionManager;
use taskgrid::orchestrator::worker_coordinator::{CoordinatorConfig, WorkerCoordinator};
use taskgrid::persistence::retention;
use taskgrid::persistence::store::SessionStore;
use taskgrid::{AppError, Result};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "taskgrid", about = "In-process task scheduler daemon", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the snapshot file location from the config.
    #[arg(long)]
    state: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("taskgrid daemon bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(state_path) = args.state {
        config.state_path = state_path;
    }
    info!(state_path = %config.state_path.display(), "configuration loaded");

    // ── Restore session state ───────────────────────────
    let store = SessionStore::new(&config.state_path);
    let manager = Arc::new(
        SessionManager::load(store)
            .await?
            .first_start_wins(config.first_start_wins),
    );

    let coordinator = Arc::new(WorkerCoordinator::new(CoordinatorConfig {
        max_workers: config.max_workers,
        heartbeat_timeout: config.heartbeat_timeout(),
    }));

    // ── Start background drivers ────────────────────────
    let ct = CancellationToken::new();
    let health_handle = health_monitor::spawn_health_monitor(
        Arc::clone(&coordinator),
        config.health_check_interval(),
        ct.clone(),
    );
    let retention_handle = retention::spawn_retention_task(
        Arc::clone(&manager),
        config.retention_days,
        config.retention_interval(),
        ct.clone(),
    );
    info!("background drivers started");

    // ── Periodic status summary ─────────────────────────
    let status_ct = ct.clone();
    let status_manager = Arc::clone(&manager);
    let status_coordinator = Arc::clone(&coordinator);
    let status_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_LOG_INTERVAL);
        loop {
            tokio::select! {
                () = status_ct.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = status_manager.get_stats().await;
                    let load = status_coordinator.get_load_distribution().await;
                    info!(
                        sessions_total = stats.total,
                        sessions_active = stats.active,
                        workers_total = load.total_workers,
                        workers_busy = load.busy,
                        queued_tasks = load.queued_tasks,
                        utilization = load.utilization_percent,
                        "scheduler status"
                    );
                }
            }
        }
    });

    info!("taskgrid ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    // ── Graceful shutdown: final snapshot ───────────────
    if let Err(err) = manager.snapshot().await {
        error!(%err, "final snapshot failed");
    }

    let _ = tokio::join!(health_handle, retention_handle, status_handle);
    info!("taskgrid shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
