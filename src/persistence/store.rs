//! Durable session snapshots as a single JSON file.
//!
//! The file is rewritten in full on every mutating call of the session
//! manager. Writes go to a sibling temp file first and are renamed into
//! place so a crash mid-write cannot truncate the previous snapshot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::session::Session;
use crate::{AppError, Result};

/// Snapshot format version written to and expected in the state file.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// On-disk snapshot envelope.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: String,
    sessions: Vec<Session>,
}

/// File-backed store for the session manager's state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all sessions from the snapshot file.
    ///
    /// A missing file is treated as an empty store. A version drift is
    /// tolerated with a warning so older snapshots remain readable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persist` if the file exists but cannot be read
    /// or parsed.
    pub async fn load(&self) -> Result<Vec<Session>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file; starting empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(AppError::Persist(format!(
                    "cannot read snapshot {}: {err}",
                    self.path.display()
                )));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&raw).map_err(|err| {
            AppError::Persist(format!(
                "malformed snapshot {}: {err}",
                self.path.display()
            ))
        })?;

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                found = %snapshot.version,
                expected = SNAPSHOT_VERSION,
                "snapshot version drift; loading anyway"
            );
        }

        Ok(snapshot.sessions)
    }

    /// Rewrite the snapshot file with the given sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persist` if serialization or any file operation
    /// fails.
    pub async fn save(&self, sessions: Vec<Session>) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION.to_owned(),
            sessions,
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    AppError::Persist(format!(
                        "cannot create snapshot directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        // Write-then-rename keeps the previous snapshot intact if the
        // process dies mid-write.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(|err| {
            AppError::Persist(format!("cannot write snapshot {}: {err}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| {
            AppError::Persist(format!(
                "cannot replace snapshot {}: {err}",
                self.path.display()
            ))
        })?;

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "snapshot written"
        );
        Ok(())
    }
}
