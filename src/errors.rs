//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Requested session or worker does not exist.
    NotFound(String),
    /// File-lock collision with another active session.
    ///
    /// Carries enough detail for the caller to decide whether to wait,
    /// abort, or pick different files.
    LockConflict {
        /// Session currently holding the contested paths.
        session_id: String,
        /// Human label of the blocking session.
        session_name: String,
        /// Paths requested by the caller that are already held.
        paths: Vec<String>,
    },
    /// Operation is not valid for the entity's current lifecycle state.
    InvalidState(String),
    /// Worker pool is at its configured capacity.
    PoolExhausted(String),
    /// Snapshot read or write failure.
    Persist(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::LockConflict {
                session_id,
                session_name,
                paths,
            } => write!(
                f,
                "lock conflict: [{}] held by session {session_id} ({session_name})",
                paths.join(", ")
            ),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::PoolExhausted(msg) => write!(f, "pool exhausted: {msg}"),
            Self::Persist(msg) => write!(f, "persist: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persist(format!("snapshot serialization: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Persist(err.to_string())
    }
}
