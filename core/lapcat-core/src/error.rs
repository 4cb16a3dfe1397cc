//! Error types for lapcat-core operations.
//!
//! The per-frame update path never returns these: frame-level problems degrade
//! to "no counting" instead. Errors only cross file, resolution and replay
//! boundaries.

use std::path::PathBuf;

/// All errors that can occur in lapcat-core operations.
#[derive(Debug, thiserror::Error)]
pub enum LapError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Game Data Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Could not resolve gesture ids: {missing}")]
    GestureIdsUnresolved { missing: String },

    #[error("Game data source unavailable: {0}")]
    GameDataUnavailable(String),

    #[error("Actor snapshot unreadable: actor {actor_id}: {details}")]
    SnapshotUnreadable { actor_id: u64, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Statistics Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No statistics entry for: {0}")]
    EntryNotFound(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using LapError.
pub type Result<T> = std::result::Result<T, LapError>;

impl From<LapError> for String {
    fn from(err: LapError) -> String {
        err.to_string()
    }
}
