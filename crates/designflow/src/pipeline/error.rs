use thiserror::Error;

use crate::job::{JobId, JobStatus, StageName};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Expected stage '{expected}' at position {position}, found {found}")]
    StageOrder {
        position: usize,
        expected: StageName,
        found: String,
    },

    #[error("Job {id} is {status}; only pending jobs can be run")]
    NotPending { id: JobId, status: JobStatus },

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
}

/// Failure reported by a stage executor.
///
/// The message is recorded verbatim on the step and on the job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
