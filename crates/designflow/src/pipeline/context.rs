use crate::job::{DesignJob, JobId, StageName, StageResult};

/// Input handed to every stage executor.
pub struct StageContext {
    pub job_id: JobId,
    pub design_prompt: String,
    /// Storage key of the uploaded garment photograph.
    pub garment_image: Option<String>,
    pub style_swatch_image: Option<String>,

    // Results of the stages completed so far, in pipeline order.
    results: Vec<StageResult>,
}

impl StageContext {
    pub fn from_job(job: &DesignJob) -> Self {
        Self {
            job_id: job.id,
            design_prompt: job.design_prompt.clone(),
            garment_image: job.garment_image.clone(),
            style_swatch_image: job.style_swatch_image.clone(),
            results: Vec::new(),
        }
    }

    /// Output of an earlier stage, if it has completed.
    pub fn result(&self, stage: StageName) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage() == stage)
    }

    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    pub(crate) fn push_result(&mut self, result: StageResult) {
        self.results.push(result);
    }
}
