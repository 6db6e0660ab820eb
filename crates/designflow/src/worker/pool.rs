use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::RunnerError;
use crate::job::{JobId, JobStatus};
use crate::pipeline::{Pipeline, PipelineError};

type ActiveSet = Arc<Mutex<HashSet<JobId>>>;

fn lock(active: &Mutex<HashSet<JobId>>) -> MutexGuard<'_, HashSet<JobId>> {
    match active.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Runner pool lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Unregisters a job when its run ends, including on panic.
struct ActiveGuard {
    active: ActiveSet,
    job_id: JobId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.job_id);
    }
}

/// Runs pipelines on Tokio tasks, at most one run per job id.
pub struct RunnerPool {
    pipeline: Arc<Pipeline>,
    active: ActiveSet,
}

impl RunnerPool {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Starts the pipeline for `job_id` on the current Tokio runtime.
    pub fn spawn(
        &self,
        job_id: JobId,
    ) -> Result<JoinHandle<Result<JobStatus, PipelineError>>, RunnerError> {
        let runtime = Handle::try_current().map_err(|_| RunnerError::NoRuntime)?;

        if !lock(&self.active).insert(job_id) {
            return Err(RunnerError::AlreadyRunning(job_id));
        }
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            job_id,
        };
        let pipeline = Arc::clone(&self.pipeline);

        debug!("Spawning pipeline for job {}", job_id);
        let handle = runtime.spawn(async move {
            let _guard = guard;
            let result = pipeline.run(&job_id).await;
            match &result {
                Ok(status) => info!("Job {} finished with status {}", job_id, status),
                Err(e) => error!("Job {} aborted: {}", job_id, e),
            }
            result
        });

        Ok(handle)
    }

    pub fn is_running(&self, job_id: &JobId) -> bool {
        lock(&self.active).contains(job_id)
    }

    /// Ids of jobs whose run has not finished yet.
    pub fn active_jobs(&self) -> Vec<JobId> {
        lock(&self.active).iter().copied().collect()
    }
}
