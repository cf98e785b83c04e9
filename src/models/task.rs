//! Task descriptors for the coordinator's queue and assignment map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending task waiting in the FIFO backlog for an idle worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct QueuedTask {
    /// Caller-supplied task identifier.
    pub task_id: String,
    /// Opaque work payload, passed through untouched.
    pub payload: serde_json::Value,
    /// Session the task belongs to, when the caller correlates one.
    pub session_id: Option<String>,
    /// When the task entered the queue.
    pub queued_at: DateTime<Utc>,
}

impl QueuedTask {
    /// Construct a queue entry stamped with the current time.
    #[must_use]
    pub fn new(task_id: String, payload: serde_json::Value, session_id: Option<String>) -> Self {
        Self {
            task_id,
            payload,
            session_id,
            queued_at: Utc::now(),
        }
    }
}

/// An in-flight assignment of a task to a worker.
///
/// The payload and session id are retained here so the task can be
/// requeued intact if its worker goes offline or is unregistered.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAssignment {
    /// Worker currently holding the task.
    pub worker_id: String,
    /// Original opaque payload.
    pub payload: serde_json::Value,
    /// Originating session, when one was given at assignment time.
    pub session_id: Option<String>,
}
