//! Job record data model: the aggregate design job, its six steps, and the
//! partial updates that move them through their lifecycle.

mod error;
mod record;
mod stage;
mod step;

pub use error::{TransitionError, UnknownStage};
pub use record::{DesignJob, JobId, JobPatch, JobStatus};
pub use stage::{StageName, StageResult};
pub use step::{completion_percent, Step, StepPatch, StepStatus};
