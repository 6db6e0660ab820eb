//! Job record store: persisted design jobs plus per-job change feeds.
//!
//! Access is split in two handles. Producers (the submission service and the
//! pipeline runner) hold a [`JobWriter`]; observers such as the progress
//! projector only get a [`JobReader`].

mod error;
pub mod job_store;
mod notifier;

pub use error::{NotificationError, StoreError};
pub use job_store::{JobListResponse, JobQueryParams, JobStore, StatusCounts};
pub use notifier::JobSubscription;

use crate::job::{DesignJob, JobId, JobPatch};

/// Read side of the store.
pub trait JobReader: Send + Sync {
    /// Point read of the current record.
    fn get_job(&self, id: &JobId) -> Result<DesignJob, StoreError>;

    /// Opens a feed delivering the full record after every committed change.
    fn subscribe(&self, id: &JobId) -> Result<JobSubscription, StoreError>;
}

/// Write side of the store.
pub trait JobWriter: JobReader {
    fn create_job(&self, job: DesignJob) -> Result<JobId, StoreError>;

    /// Applies `patch` atomically and notifies subscribers.
    ///
    /// Returns the committed record. Writes to a finished job and patches
    /// that break a lifecycle invariant are rejected without side effects.
    fn update_job(&self, id: &JobId, patch: JobPatch) -> Result<DesignJob, StoreError>;
}
