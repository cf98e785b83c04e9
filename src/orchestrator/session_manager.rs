//! Session lifecycle management, progress accounting, and file-lock
//! arbitration.
//!
//! The manager owns the session map behind a single `RwLock` so every
//! check-then-act sequence (state-machine validation, the conflict scan in
//! [`SessionManager::lock_files`]) runs inside one critical section. Every
//! successful mutation rewrites the snapshot file before returning.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::session::{Session, SessionStatus};
use crate::persistence::store::SessionStore;
use crate::{AppError, Result};

/// Aggregate session counts for the reporting interface.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionStats {
    /// All sessions currently known to the manager.
    pub total: usize,
    /// Sessions in `Running` status.
    pub active: usize,
    /// Sessions in `Paused` status.
    pub paused: usize,
    /// Sessions in `Completed` status.
    pub completed: usize,
    /// Sessions in `Failed` status.
    pub failed: usize,
}

/// Owns the session map and the durable snapshot store.
///
/// Injectable state, not a singleton — independent managers coexist in
/// tests and in-process composition.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    store: SessionStore,
    first_start_wins: bool,
}

impl SessionManager {
    /// Create an empty manager backed by the given store.
    #[must_use]
    pub fn new(store: SessionStore) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            first_start_wins: false,
        }
    }

    /// Preserve the original `started_at` across resumes instead of
    /// overwriting it on every transition into `Running`.
    #[must_use]
    pub fn first_start_wins(mut self, enabled: bool) -> Self {
        self.first_start_wins = enabled;
        self
    }

    /// Create a manager restored from the store's snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persist` if the snapshot exists but cannot be
    /// read or parsed.
    pub async fn load(store: SessionStore) -> Result<Self> {
        let sessions = store.load().await?;
        info!(count = sessions.len(), "sessions restored from snapshot");
        let map = sessions.into_iter().map(|s| (s.id.clone(), s)).collect();
        Ok(Self {
            sessions: RwLock::new(map),
            store,
            first_start_wins: false,
        })
    }

    /// Create a new session in `Created` status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persist` if the snapshot write fails.
    pub async fn create_session(
        &self,
        name: &str,
        total_tasks: u32,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Session> {
        let session = Session::new(name.to_owned(), total_tasks, metadata);
        let created = session.clone();

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
        self.persist(&sessions).await?;

        info!(session_id = %created.id, name, total_tasks, "session created");
        Ok(created)
    }

    /// Transition a session into `Running` and associate a worker.
    ///
    /// Valid from `Created` or `Paused`. `started_at` is rewritten on
    /// every start unless the manager was built with
    /// [`first_start_wins`](Self::first_start_wins).
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::InvalidState` for a disallowed transition.
    pub async fn start_session(&self, id: &str, worker_id: Option<&str>) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;
        ensure_transition(session, SessionStatus::Running)?;

        session.status = SessionStatus::Running;
        if !(self.first_start_wins && session.started_at.is_some()) {
            session.started_at = Some(Utc::now());
        }
        session.worker_id = worker_id.map(str::to_owned);

        let updated = session.clone();
        self.persist(&sessions).await?;

        info!(session_id = %id, worker_id = ?worker_id, "session started");
        Ok(updated)
    }

    /// Pause a running session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::InvalidState` when the session is not `Running`.
    pub async fn pause_session(&self, id: &str) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;
        ensure_transition(session, SessionStatus::Paused)?;

        session.status = SessionStatus::Paused;
        let updated = session.clone();
        self.persist(&sessions).await?;

        info!(session_id = %id, "session paused");
        Ok(updated)
    }

    /// Complete a session, forcing progress to 100 percent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::InvalidState` for a disallowed transition.
    pub async fn complete_session(&self, id: &str) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;
        ensure_transition(session, SessionStatus::Completed)?;

        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        session.progress_percent = 100.0;

        let updated = session.clone();
        self.persist(&sessions).await?;

        info!(session_id = %id, "session completed");
        Ok(updated)
    }

    /// Mark a session failed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::InvalidState` for a disallowed transition.
    pub async fn fail_session(&self, id: &str) -> Result<Session> {
        self.finish_session(id, SessionStatus::Failed).await
    }

    /// Cancel a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::InvalidState` for a disallowed transition.
    pub async fn cancel_session(&self, id: &str) -> Result<Session> {
        self.finish_session(id, SessionStatus::Cancelled).await
    }

    async fn finish_session(&self, id: &str, status: SessionStatus) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;
        ensure_transition(session, status)?;

        session.status = status;
        session.completed_at = Some(Utc::now());

        let updated = session.clone();
        self.persist(&sessions).await?;

        info!(session_id = %id, ?status, "session finished");
        Ok(updated)
    }

    /// Overwrite the progress counters and recompute the percentage.
    ///
    /// The counters are caller-supplied; no cross-validation against
    /// `total_tasks` is performed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn update_progress(
        &self,
        id: &str,
        completed: u32,
        failed: u32,
        in_progress: u32,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;

        session.completed_tasks = completed;
        session.failed_tasks = failed;
        session.in_progress_tasks = in_progress;
        session.recompute_progress();

        let updated = session.clone();
        self.persist(&sessions).await?;
        Ok(updated)
    }

    /// Acquire exclusive locks on the given paths, all-or-nothing.
    ///
    /// The conflict scan covers every other session in `Running` or
    /// `Paused` status; terminal and `Created` sessions do not block.
    /// The scan and the mutation happen under one write guard, so two
    /// concurrent callers cannot both pass the check.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id, or
    /// `AppError::LockConflict` naming the blocking session and the
    /// overlapping paths. On conflict no path is locked.
    pub async fn lock_files(&self, id: &str, paths: &[String]) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(id) {
            return Err(AppError::NotFound(format!("session {id} not found")));
        }

        // Ordered scan keeps the reported blocker deterministic when
        // several sessions hold overlapping paths.
        let mut others: Vec<&Session> = sessions
            .values()
            .filter(|s| s.id != id && s.is_active())
            .collect();
        others.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        for other in others {
            let overlap: Vec<String> = paths
                .iter()
                .filter(|p| other.files_locked.contains(*p))
                .cloned()
                .collect();
            if !overlap.is_empty() {
                warn!(
                    session_id = %id,
                    blocking_session = %other.id,
                    paths = ?overlap,
                    "file lock conflict"
                );
                return Err(AppError::LockConflict {
                    session_id: other.id.clone(),
                    session_name: other.name.clone(),
                    paths: overlap,
                });
            }
        }

        let session = get_mut(&mut sessions, id)?;
        session.files_locked.extend(paths.iter().cloned());

        let updated = session.clone();
        self.persist(&sessions).await?;

        info!(session_id = %id, count = paths.len(), "files locked");
        Ok(updated)
    }

    /// Release locks on the given paths; an empty slice releases all.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn unlock_files(&self, id: &str, paths: &[String]) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;

        if paths.is_empty() {
            session.files_locked.clear();
        } else {
            for path in paths {
                session.files_locked.remove(path);
            }
        }

        let updated = session.clone();
        self.persist(&sessions).await?;

        info!(session_id = %id, "files unlocked");
        Ok(updated)
    }

    /// Record paths the session has written to.
    ///
    /// Independent of locking — callers may report paths the session
    /// never locked. The set is never cleared automatically.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn mark_files_modified(&self, id: &str, paths: &[String]) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = get_mut(&mut sessions, id)?;
        session.files_modified.extend(paths.iter().cloned());

        let updated = session.clone();
        self.persist(&sessions).await?;
        Ok(updated)
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// List sessions, optionally filtered by status, newest-created first.
    pub async fn list_sessions(&self, status: Option<SessionStatus>) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut result: Vec<Session> = sessions
            .values()
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result
    }

    /// List sessions in `Running` or `Paused` status.
    pub async fn get_active_sessions(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut result: Vec<Session> = sessions.values().filter(|s| s.is_active()).cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result
    }

    /// List sessions matching a status given by its snake_case name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidState` for an unrecognized status name,
    /// so a typo is distinguishable from an empty result.
    pub async fn get_sessions_by_status(&self, status: &str) -> Result<Vec<Session>> {
        let parsed = SessionStatus::from_str(status)?;
        Ok(self.list_sessions(Some(parsed)).await)
    }

    /// Aggregate counts for the reporting interface.
    pub async fn get_stats(&self) -> SessionStats {
        let sessions = self.sessions.read().await;
        let mut stats = SessionStats {
            total: sessions.len(),
            active: 0,
            paused: 0,
            completed: 0,
            failed: 0,
        };
        for session in sessions.values() {
            match session.status {
                SessionStatus::Running => stats.active += 1,
                SessionStatus::Paused => stats.paused += 1,
                SessionStatus::Completed => stats.completed += 1,
                SessionStatus::Failed => stats.failed += 1,
                SessionStatus::Created | SessionStatus::Cancelled => {}
            }
        }
        stats
    }

    /// Delete terminal sessions whose `completed_at` precedes the
    /// retention window. Persists once afterward.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persist` if the snapshot write fails.
    pub async fn cleanup_old_sessions(&self, days: u32) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| {
            !(s.status.is_terminal() && s.completed_at.is_some_and(|at| at < cutoff))
        });
        let removed = before - sessions.len();

        if removed > 0 {
            self.persist(&sessions).await?;
            info!(removed, days, "old sessions cleaned up");
        }
        Ok(removed)
    }

    /// Write the current state to the snapshot file.
    ///
    /// Mutating calls persist automatically; this exists for an explicit
    /// final write at shutdown.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persist` if the snapshot write fails.
    pub async fn snapshot(&self) -> Result<()> {
        let sessions = self.sessions.read().await;
        self.persist(&sessions).await
    }

    async fn persist(&self, sessions: &HashMap<String, Session>) -> Result<()> {
        let mut ordered: Vec<Session> = sessions.values().cloned().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        self.store.save(ordered).await
    }
}

fn get_mut<'a>(sessions: &'a mut HashMap<String, Session>, id: &str) -> Result<&'a mut Session> {
    sessions
        .get_mut(id)
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))
}

fn ensure_transition(session: &Session, next: SessionStatus) -> Result<()> {
    if session.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "session {} cannot move from {:?} to {next:?}",
            session.id, session.status
        )))
    }
}
