pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod projector;
pub mod sanitize;
pub mod service;
pub mod storage;
pub mod store;
pub mod worker;

pub use config::{load_config, Config, SimulationConfig};
pub use error::{
    ConfigError, DesignflowError, ProjectorError, Result, RunnerError, StorageError, UploadError,
    ValidationError,
};
pub use job::{DesignJob, JobId, JobPatch, JobStatus, StageName, StageResult, Step, StepStatus};
pub use pipeline::{Pipeline, StageExecutor};
pub use projector::{ProgressHandlers, ProgressProjector, ProgressView, ProjectorSubscription};
pub use service::{DesignRequest, DesignService, ImageUpload};
pub use storage::{AssetStorage, FileAssetStorage};
pub use store::{JobReader, JobStore, JobWriter, StoreError};
pub use worker::RunnerPool;
