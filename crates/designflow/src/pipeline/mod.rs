//! Sequential execution of the six design stages against the job store.

pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod simulated;
pub mod stage;

pub use context::StageContext;
pub use error::{PipelineError, StageError};
pub use progress::{NoopProgress, ProgressReporter, StoreProgress};
pub use runner::Pipeline;
pub use simulated::{replace_stage, simulated_stages, FailingStage, SimulatedStage, UploadStage};
pub use stage::StageExecutor;
