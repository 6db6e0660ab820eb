//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored row could not be turned back into a job record.
    #[error("Corrupt design row '{id}': {reason}")]
    CorruptRow { id: String, reason: String },

    #[error("Failed to encode steps: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}
