use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::job::{DesignJob, JobId, JobPatch, JobStatus, StageName, StageResult, StepPatch};
use crate::sanitize;
use crate::store::JobWriter;

use super::context::StageContext;
use super::error::PipelineError;
use super::progress::StoreProgress;
use super::stage::StageExecutor;

enum StageOutcome {
    Completed(StageResult),
    Failed(String),
}

/// Drives one job through the fixed stage list, writing every transition
/// to the store.
pub struct Pipeline {
    store: Arc<dyn JobWriter>,
    stages: Vec<Arc<dyn StageExecutor>>,
}

impl Pipeline {
    /// `stages` must cover every [`StageName`] exactly once, in pipeline order.
    pub fn new(
        store: Arc<dyn JobWriter>,
        stages: Vec<Arc<dyn StageExecutor>>,
    ) -> Result<Self, PipelineError> {
        for (position, expected) in StageName::ALL.into_iter().enumerate() {
            let found = stages.get(position).map(|s| s.stage());
            if found != Some(expected) {
                return Err(PipelineError::StageOrder {
                    position,
                    expected,
                    found: found.map_or_else(|| "nothing".to_string(), |s| s.to_string()),
                });
            }
        }
        if let Some(extra) = stages.get(StageName::ALL.len()) {
            return Err(PipelineError::StageOrder {
                position: StageName::ALL.len(),
                expected: StageName::TechPack,
                found: format!("extra stage '{}'", extra.stage()),
            });
        }

        Ok(Self { store, stages })
    }

    /// Runs every stage of a pending job.
    ///
    /// Returns the terminal status. A failing stage is not an error here: it
    /// is recorded on the job and yields `Ok(JobStatus::Error)`. `Err` means
    /// the store itself refused a write.
    pub async fn run(&self, job_id: &JobId) -> Result<JobStatus, PipelineError> {
        let job = self.store.get_job(job_id)?;
        if job.status != JobStatus::Pending {
            return Err(PipelineError::NotPending {
                id: job.id,
                status: job.status,
            });
        }

        let span = info_span!("pipeline",
            job_id = %job.id,
            prompt = %sanitize::redact_prompt(&job.design_prompt),
        );
        self.run_stages(job).instrument(span).await
    }

    async fn run_stages(&self, job: DesignJob) -> Result<JobStatus, PipelineError> {
        let id = job.id;
        let mut ctx = StageContext::from_job(&job);

        self.store
            .update_job(&id, JobPatch::status(JobStatus::Processing))?;
        info!("Pipeline started");

        for executor in &self.stages {
            let stage = executor.stage();
            let outcome = self
                .run_stage(&id, executor.as_ref(), &ctx)
                .instrument(info_span!("stage", stage = %stage))
                .await;

            match outcome {
                Ok(StageOutcome::Completed(result)) => ctx.push_result(result),
                Ok(StageOutcome::Failed(message)) => {
                    if let Err(e) = self.store.update_job(&id, JobPatch::failed(message.clone())) {
                        let e = PipelineError::from(e);
                        self.abandon(&id, stage, &e);
                        return Err(e);
                    }
                    warn!(stage = %stage, error = %message, "Pipeline failed");
                    return Ok(JobStatus::Error);
                }
                Err(e) => {
                    self.abandon(&id, stage, &e);
                    return Err(e);
                }
            }
        }

        self.store
            .update_job(&id, JobPatch::status(JobStatus::Completed))?;
        info!("Pipeline completed");
        Ok(JobStatus::Completed)
    }

    async fn run_stage(
        &self,
        id: &JobId,
        executor: &dyn StageExecutor,
        ctx: &StageContext,
    ) -> Result<StageOutcome, PipelineError> {
        let stage = executor.stage();
        self.store
            .update_job(id, JobPatch::step(StepPatch::started(stage)))?;
        debug!("Stage started");

        let progress = StoreProgress::new(Arc::clone(&self.store), *id, stage);
        let message = match executor.execute(ctx, &progress).await {
            Ok(result) if result.stage() == stage => {
                self.store.update_job(
                    id,
                    JobPatch::step(StepPatch::completed(stage, result.clone())),
                )?;
                debug!("Stage completed");
                return Ok(StageOutcome::Completed(result));
            }
            Ok(result) => format!(
                "Stage '{}' produced a result for '{}'",
                stage,
                result.stage()
            ),
            Err(e) => e.message,
        };

        self.store
            .update_job(id, JobPatch::step(StepPatch::failed(stage, message.clone())))?;
        Ok(StageOutcome::Failed(message))
    }

    /// Best-effort attempt to leave the job failed after a store error.
    fn abandon(&self, id: &JobId, stage: StageName, err: &PipelineError) {
        let message = err.to_string();
        let result = self
            .store
            .update_job(id, JobPatch::step(StepPatch::failed(stage, message.clone())))
            .and_then(|_| self.store.update_job(id, JobPatch::failed(message)));
        if let Err(e) = result {
            warn!(job_id = %id, error = %e, "Could not mark job as failed");
        }
    }
}
