use std::sync::Arc;

use tracing::warn;

use crate::job::{JobId, JobPatch, StageName, StepPatch};
use crate::store::JobWriter;

pub trait ProgressReporter: Send + Sync {
    /// Reports stage progress as a percentage; values above 100 are clamped.
    fn report(&self, percent: u8);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _percent: u8) {}
}

/// Writes every report to the store as a step progress update.
pub struct StoreProgress {
    store: Arc<dyn JobWriter>,
    job_id: JobId,
    stage: StageName,
}

impl StoreProgress {
    pub fn new(store: Arc<dyn JobWriter>, job_id: JobId, stage: StageName) -> Self {
        Self {
            store,
            job_id,
            stage,
        }
    }
}

impl ProgressReporter for StoreProgress {
    fn report(&self, percent: u8) {
        let patch = JobPatch::step(StepPatch::progress(self.stage, percent));
        if let Err(e) = self.store.update_job(&self.job_id, patch) {
            warn!(stage = %self.stage, error = %e, "Dropped progress update");
        }
    }
}
