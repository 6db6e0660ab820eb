use async_trait::async_trait;

use crate::job::{StageName, StageResult};

use super::context::StageContext;
use super::error::StageError;
use super::progress::ProgressReporter;

/// One opaque unit of pipeline work.
///
/// Executors run strictly one after another; `execute` is the only point at
/// which a run suspends.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// The step this executor drives.
    fn stage(&self) -> StageName;

    /// Performs the work. Intermediate progress (0–100) goes to `progress`.
    async fn execute(
        &self,
        ctx: &StageContext,
        progress: &dyn ProgressReporter,
    ) -> Result<StageResult, StageError>;
}
