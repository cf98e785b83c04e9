//! Worker model for the execution pool.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;

/// Availability status for a pooled worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Registered and available for assignment.
    Idle,
    /// Executing an assigned task.
    Busy,
    /// Missed its heartbeat window; no longer assignable.
    Offline,
    /// Faulted; reserved for caller-side diagnostics.
    Error,
}

impl FromStr for WorkerStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            "error" => Ok(Self::Error),
            other => Err(AppError::InvalidState(format!(
                "unknown worker status '{other}'"
            ))),
        }
    }
}

/// Worker domain entity. An execution slot holding at most one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Worker {
    /// Unique identifier; immutable after registration.
    pub id: String,
    /// Current availability status.
    pub status: WorkerStatus,
    /// Session whose task this worker is executing, while busy.
    pub current_session_id: Option<String>,
    /// Task currently held, while busy.
    pub current_task_id: Option<String>,
    /// Monotone count of successfully completed tasks.
    pub tasks_completed: u64,
    /// Monotone count of failed tasks.
    pub tasks_failed: u64,
    /// Most recent liveness signal; `None` means never reported.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Registration timestamp; immutable.
    pub created_at: DateTime<Utc>,
    /// Opaque key/value bag supplied at registration.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Worker {
    /// Construct a newly registered idle worker.
    #[must_use]
    pub fn new(metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: WorkerStatus::Idle,
            current_session_id: None,
            current_task_id: None,
            tasks_completed: 0,
            tasks_failed: 0,
            last_heartbeat: Some(now),
            created_at: now,
            metadata,
        }
    }

    /// Clear the task association and return the worker to the given status.
    pub fn release(&mut self, status: WorkerStatus) {
        self.status = status;
        self.current_session_id = None;
        self.current_task_id = None;
    }
}
