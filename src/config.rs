//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_max_concurrent_sessions() -> u32 {
    3
}

fn default_max_workers() -> usize {
    8
}

fn default_heartbeat_timeout_seconds() -> u64 {
    30
}

fn default_health_check_interval_seconds() -> u64 {
    5
}

fn default_retention_days() -> u32 {
    30
}

fn default_retention_interval_seconds() -> u64 {
    3600
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Location of the session snapshot file.
    pub state_path: PathBuf,
    /// Advisory cap on concurrently active sessions. Validated non-zero
    /// but not enforced by the session manager itself.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: u32,
    /// Enforced ceiling on the worker pool size.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Heartbeat staleness threshold before a worker is marked offline.
    #[serde(default = "default_heartbeat_timeout_seconds")]
    pub heartbeat_timeout_seconds: u64,
    /// Interval between health-check sweeps of the worker pool.
    #[serde(default = "default_health_check_interval_seconds")]
    pub health_check_interval_seconds: u64,
    /// Days after session completion before its record is purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Interval between retention purge passes.
    #[serde(default = "default_retention_interval_seconds")]
    pub retention_interval_seconds: u64,
    /// Preserve the original `started_at` when a session resumes from
    /// paused, instead of overwriting it on every start.
    #[serde(default)]
    pub first_start_wins: bool,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Heartbeat staleness threshold as a [`Duration`].
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_seconds)
    }

    /// Health-check sweep interval as a [`Duration`].
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    /// Retention purge interval as a [`Duration`].
    #[must_use]
    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_sessions == 0 {
            return Err(AppError::Config(
                "max_concurrent_sessions must be greater than zero".into(),
            ));
        }

        if self.max_workers == 0 {
            return Err(AppError::Config(
                "max_workers must be greater than zero".into(),
            ));
        }

        if self.heartbeat_timeout_seconds == 0 {
            return Err(AppError::Config(
                "heartbeat_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.health_check_interval_seconds == 0 {
            return Err(AppError::Config(
                "health_check_interval_seconds must be greater than zero".into(),
            ));
        }

        if self.state_path.as_os_str().is_empty() {
            return Err(AppError::Config("state_path must not be empty".into()));
        }

        Ok(())
    }
}
