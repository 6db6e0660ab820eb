use thiserror::Error;

use super::record::{JobId, JobStatus};
use super::stage::StageName;
use super::step::StepStatus;

/// A stage identity that is not part of the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

/// A patch that would break a job or step invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Job {id} is already {status} and can no longer change")]
    JobFinished { id: JobId, status: JobStatus },

    #[error("Job cannot move from {from} to {to}")]
    Job { from: JobStatus, to: JobStatus },

    #[error("Step '{stage}' cannot move from {from} to {to}")]
    Step {
        stage: StageName,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("Job has no step '{stage}'")]
    MissingStep { stage: StageName },

    #[error("Step '{stage}' cannot start while '{running}' is processing")]
    ConcurrentStep {
        stage: StageName,
        running: StageName,
    },

    #[error("Current step index {index} is outside the step list")]
    StepIndexOutOfRange { index: usize },

    #[error("Step '{stage}' precedes the current step '{current}'")]
    StepRegression {
        stage: StageName,
        current: StageName,
    },

    #[error("Progress for step '{stage}' can only be reported while it is processing")]
    ProgressOutsideProcessing { stage: StageName },

    #[error("Step '{stage}' received a result produced by '{produced_by}'")]
    ResultMismatch {
        stage: StageName,
        produced_by: StageName,
    },

    #[error("Step '{stage}' can only carry a result once completed")]
    ResultBeforeCompletion { stage: StageName },

    #[error("Job cannot complete while step '{stage}' is {status}")]
    IncompleteSteps { stage: StageName, status: StepStatus },

    #[error("Job cannot fail without a failed step")]
    NoFailedStep,

    #[error("An error message can only be recorded together with an error status")]
    MessageWithoutError,
}
