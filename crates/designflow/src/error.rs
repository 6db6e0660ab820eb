use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobId;
use crate::storage::AssetKind;

#[derive(Error, Debug)]
pub enum DesignflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid design request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Job store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Progress projector error: {0}")]
    Projector(#[from] ProjectorError),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejected submission input. Nothing has been written when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Design prompt must not be empty")]
    EmptyPrompt,

    #[error("A garment image is required")]
    MissingGarmentImage,

    #[error("The {asset} is empty")]
    EmptyImage { asset: AssetKind },
}

/// An asset could not be written to storage.
///
/// The message doubles as the job's error message.
#[derive(Error, Debug)]
#[error("Failed to upload {asset}")]
pub struct UploadError {
    pub asset: AssetKind,
    #[source]
    pub source: StorageError,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Job {0} is already running")]
    AlreadyRunning(JobId),

    #[error("No Tokio runtime is available to run the pipeline")]
    NoRuntime,
}

#[derive(Error, Debug)]
pub enum ProjectorError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("No Tokio runtime is available to follow the job")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, DesignflowError>;
