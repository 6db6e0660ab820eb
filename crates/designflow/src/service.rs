//! Design submission: validate, record, upload, hand off to the runner.

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span};

use crate::error::{DesignflowError, RunnerError, UploadError, ValidationError};
use crate::job::{DesignJob, JobId, JobPatch, JobStatus, StageName, StepPatch};
use crate::pipeline::PipelineError;
use crate::sanitize;
use crate::storage::{asset_key, AssetKind, AssetStorage};
use crate::store::JobWriter;
use crate::worker::RunnerPool;

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(sanitize::redact_path(path), bytes))
    }

    /// File extension used for the storage key. Falls back to `png` when the
    /// filename does not name an image type.
    pub fn extension(&self) -> String {
        let is_image = mime_guess::from_path(&self.filename)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
        match Path::new(&self.filename).extension().and_then(|e| e.to_str()) {
            Some(ext) if is_image => ext.to_ascii_lowercase(),
            _ => "png".to_string(),
        }
    }

    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .to_string()
    }
}

/// A user's design submission.
#[derive(Debug, Clone, Default)]
pub struct DesignRequest {
    pub garment_image: Option<ImageUpload>,
    pub style_swatch_image: Option<ImageUpload>,
    pub design_prompt: String,
}

impl DesignRequest {
    /// Checks required inputs. Runs before anything is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.design_prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let garment = self
            .garment_image
            .as_ref()
            .ok_or(ValidationError::MissingGarmentImage)?;
        if garment.bytes.is_empty() {
            return Err(ValidationError::EmptyImage {
                asset: AssetKind::Garment,
            });
        }
        if let Some(ref swatch) = self.style_swatch_image {
            if swatch.bytes.is_empty() {
                return Err(ValidationError::EmptyImage {
                    asset: AssetKind::StyleSwatch,
                });
            }
        }
        Ok(())
    }
}

/// Entry point for new design jobs.
pub struct DesignService {
    store: Arc<dyn JobWriter>,
    assets: Arc<dyn AssetStorage>,
    runner: RunnerPool,
}

impl DesignService {
    pub fn new(store: Arc<dyn JobWriter>, assets: Arc<dyn AssetStorage>, runner: RunnerPool) -> Self {
        Self {
            store,
            assets,
            runner,
        }
    }

    pub fn runner(&self) -> &RunnerPool {
        &self.runner
    }

    /// Submits a design and returns its job id as soon as the pipeline has
    /// been started. Must be called within a Tokio runtime.
    pub fn create_design(&self, request: DesignRequest) -> Result<JobId, DesignflowError> {
        self.submit(request).map(|(id, _)| id)
    }

    /// Like [`create_design`](Self::create_design) but also returns the
    /// handle of the spawned run.
    pub fn submit(
        &self,
        request: DesignRequest,
    ) -> Result<(JobId, JoinHandle<Result<JobStatus, PipelineError>>), DesignflowError> {
        request.validate()?;
        Handle::try_current().map_err(|_| RunnerError::NoRuntime)?;

        let DesignRequest {
            garment_image,
            style_swatch_image,
            design_prompt,
        } = request;
        let garment = garment_image.ok_or(ValidationError::MissingGarmentImage)?;

        let prompt = design_prompt.trim();
        let _span = info_span!("create_design", prompt = %sanitize::redact_prompt(prompt)).entered();

        let id = self.store.create_job(DesignJob::new(prompt))?;

        let garment_key = self.upload_or_fail(&id, AssetKind::Garment, &garment)?;
        let swatch_key = match style_swatch_image {
            Some(ref swatch) => Some(self.upload_or_fail(&id, AssetKind::StyleSwatch, swatch)?),
            None => None,
        };
        self.store
            .update_job(&id, JobPatch::assets(garment_key, swatch_key))?;

        let handle = self.runner.spawn(id)?;
        info!(job_id = %id, "Design submitted");
        Ok((id, handle))
    }

    fn upload_or_fail(
        &self,
        id: &JobId,
        asset: AssetKind,
        upload: &ImageUpload,
    ) -> Result<String, DesignflowError> {
        let key = asset_key(id, asset, &upload.extension());
        match self.assets.put(&key, &upload.bytes) {
            Ok(()) => Ok(key),
            Err(source) => {
                let err = UploadError { asset, source };
                error!(job_id = %id, error = %err, cause = %err.source, "Asset upload failed");
                self.mark_upload_failed(id, &err.to_string());
                Err(err.into())
            }
        }
    }

    /// Records an upload failure on the upload step and the job.
    fn mark_upload_failed(&self, id: &JobId, message: &str) {
        let result = self
            .store
            .update_job(id, JobPatch::step(StepPatch::started(StageName::Upload)))
            .and_then(|_| {
                self.store.update_job(
                    id,
                    JobPatch::step(StepPatch::failed(StageName::Upload, message)),
                )
            })
            .and_then(|_| self.store.update_job(id, JobPatch::failed(message)));
        if let Err(e) = result {
            error!(job_id = %id, error = %e, "Could not record upload failure");
        }
    }
}
