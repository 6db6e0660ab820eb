//! Store error types.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{JobId, TransitionError};

/// Errors returned by the job record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} already exists")]
    AlreadyExists(JobId),

    #[error("Invalid job record {id}: {reason}")]
    InvalidRecord { id: JobId, reason: String },

    #[error("Rejected update: {0}")]
    Transition(#[from] TransitionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A change notification that could not be delivered.
///
/// Neither case is fatal to a consumer: `Lagged` means the record should be
/// re-read, `Closed` means no further changes will arrive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Subscriber lagged behind and missed {0} notifications")]
    Lagged(u64),

    #[error("Notification channel closed")]
    Closed,
}
