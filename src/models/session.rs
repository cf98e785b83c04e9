//! Session model and lifecycle helpers.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;

/// Lifecycle status for a task session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created but not yet started.
    Created,
    /// Session actively executing tasks.
    Running,
    /// Session paused by the caller.
    Paused,
    /// Session finished with all work done.
    Completed,
    /// Session ended in failure.
    Failed,
    /// Session cancelled before completion.
    Cancelled,
}

impl SessionStatus {
    /// Whether this status is terminal (no further transitions).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(AppError::InvalidState(format!(
                "unknown session status '{other}'"
            ))),
        }
    }
}

/// Session domain entity persisted in the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Unique record identifier; immutable after creation.
    pub id: String,
    /// Human label; immutable after creation.
    pub name: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Most recent transition into `Running`; rewritten on resume.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal transition timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Total number of tasks in the batch, supplied by the caller.
    pub total_tasks: u32,
    /// Tasks reported completed.
    pub completed_tasks: u32,
    /// Tasks reported failed.
    pub failed_tasks: u32,
    /// Tasks reported in progress.
    pub in_progress_tasks: u32,
    /// Derived completion percentage; recomputed on progress updates.
    pub progress_percent: f64,
    /// Paths held exclusively by this session.
    pub files_locked: BTreeSet<String>,
    /// Paths this session has written to; never cleared automatically.
    pub files_modified: BTreeSet<String>,
    /// Worker associated at start time; not updated per task.
    pub worker_id: Option<String>,
    /// Opaque key/value bag supplied by the caller.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    /// Construct a new session with defaults and generated identifier.
    #[must_use]
    pub fn new(
        name: String,
        total_tasks: u32,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            status: SessionStatus::Created,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_tasks,
            completed_tasks: 0,
            failed_tasks: 0,
            in_progress_tasks: 0,
            progress_percent: 0.0,
            files_locked: BTreeSet::new(),
            files_modified: BTreeSet::new(),
            worker_id: None,
            metadata,
        }
    }

    /// Whether the session participates in lock conflict checks.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Paused)
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self.status, next),
            (
                SessionStatus::Created | SessionStatus::Paused,
                SessionStatus::Running
            ) | (SessionStatus::Running, SessionStatus::Paused)
                | (
                    SessionStatus::Running | SessionStatus::Paused,
                    SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
                )
        )
    }

    /// Recompute `progress_percent` from the current counters.
    ///
    /// Zero `total_tasks` always yields zero percent.
    pub fn recompute_progress(&mut self) {
        self.progress_percent = if self.total_tasks == 0 {
            0.0
        } else {
            f64::from(self.completed_tasks) / f64::from(self.total_tasks) * 100.0
        };
    }
}
