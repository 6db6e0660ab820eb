//! Isolated environment for running designs end to end.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use designflow::db::Database;
use designflow::job::StepPatch;
use designflow::pipeline::{replace_stage, simulated_stages, FailingStage, StageExecutor};
use designflow::{
    AssetStorage, DesignRequest, DesignService, FileAssetStorage, ImageUpload, JobId, JobPatch,
    JobStatus, JobStore, JobWriter, Pipeline, RunnerPool, SimulationConfig, StageName, StageResult,
    StorageError,
};

/// Minimal PNG signature; stages never decode the image.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Simulation settings with no delay, so runs finish immediately.
pub fn instant_simulation() -> SimulationConfig {
    SimulationConfig {
        step_delay_ms: 0,
        progress_ticks: 4,
    }
}

pub fn design_request(prompt: &str) -> DesignRequest {
    DesignRequest {
        garment_image: Some(ImageUpload::new("jacket.png", PNG_BYTES.to_vec())),
        style_swatch_image: None,
        design_prompt: prompt.to_string(),
    }
}

/// A plausible result for `stage`.
pub fn stage_result(stage: StageName) -> StageResult {
    match stage {
        StageName::Upload => StageResult::Upload {
            garment_image: "garment.png".to_string(),
            style_swatch_image: None,
        },
        StageName::Segmentation => StageResult::Segmentation {
            mask: "mask.png".to_string(),
        },
        StageName::ConceptGeneration => StageResult::ConceptGeneration {
            concepts: vec!["concept-1.png".to_string()],
        },
        StageName::PatternDrafting => StageResult::PatternDrafting {
            pattern: "pattern.dxf".to_string(),
        },
        StageName::FitSimulation => StageResult::FitSimulation {
            simulation: "fit.glb".to_string(),
        },
        StageName::TechPack => StageResult::TechPack {
            tech_pack: "tech-pack.pdf".to_string(),
        },
    }
}

/// Writes a complete successful run for `id` directly to the store, without
/// yielding to other tasks. Returns the number of committed changes.
pub fn commit_successful_run(store: &JobStore, id: &JobId) -> usize {
    let mut patches = vec![JobPatch::status(JobStatus::Processing)];
    for stage in StageName::ALL {
        patches.push(JobPatch::step(StepPatch::started(stage)));
        patches.push(JobPatch::step(StepPatch::progress(stage, 50)));
        patches.push(JobPatch::step(StepPatch::completed(stage, stage_result(stage))));
    }
    patches.push(JobPatch::status(JobStatus::Completed));

    let count = patches.len();
    for patch in patches {
        store.update_job(id, patch).expect("Failed to commit patch");
    }
    count
}

/// Storage that rejects every write.
pub struct BrokenStorage;

impl AssetStorage for BrokenStorage {
    fn put(&self, key: &str, _content: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::WriteFile {
            path: PathBuf::from(key),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"),
        })
    }

    fn exists(&self, _key: &str) -> bool {
        false
    }
}

/// Temp directory, job store and asset storage for one test.
pub struct TestHarness {
    temp_dir: TempDir,
    pub asset_dir: PathBuf,
    pub store: Arc<JobStore>,
    pub assets: Arc<FileAssetStorage>,
}

impl TestHarness {
    /// In-memory store only.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let asset_dir = temp_dir.path().join("assets");
        std::fs::create_dir_all(&asset_dir).expect("Failed to create asset dir");

        Self {
            assets: Arc::new(FileAssetStorage::new(&asset_dir)),
            store: Arc::new(JobStore::new(64)),
            asset_dir,
            temp_dir,
        }
    }

    /// Store backed by a SQLite file inside the temp directory.
    pub fn with_database() -> Self {
        let harness = Self::new();
        let db = Database::open(&harness.database_path()).expect("Failed to open database");
        harness.store.set_database(db);
        harness
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("data").join("designflow.db")
    }

    /// A second store over the same database file, as after a restart.
    pub fn reopen_store(&self) -> Arc<JobStore> {
        let store = Arc::new(JobStore::new(64));
        let db = Database::open(&self.database_path()).expect("Failed to reopen database");
        store.set_database(db);
        store
    }

    /// Upload check followed by five instant simulated stages.
    pub fn instant_stages(&self) -> Vec<Arc<dyn StageExecutor>> {
        simulated_stages(&instant_simulation(), self.assets.clone())
    }

    /// Instant stages with `stage` replaced by one that fails with `message`.
    pub fn failing_stages(&self, stage: StageName, message: &str) -> Vec<Arc<dyn StageExecutor>> {
        let mut stages = self.instant_stages();
        replace_stage(&mut stages, Arc::new(FailingStage::new(stage, message)));
        stages
    }

    pub fn service(&self) -> DesignService {
        self.service_with(self.instant_stages())
    }

    pub fn service_with(&self, stages: Vec<Arc<dyn StageExecutor>>) -> DesignService {
        self.service_with_storage(stages, self.assets.clone())
    }

    pub fn service_with_storage(
        &self,
        stages: Vec<Arc<dyn StageExecutor>>,
        assets: Arc<dyn AssetStorage>,
    ) -> DesignService {
        let pipeline = Pipeline::new(self.store.clone(), stages).expect("Invalid stage list");
        DesignService::new(
            self.store.clone(),
            assets,
            RunnerPool::new(Arc::new(pipeline)),
        )
    }

    pub fn asset_path(&self, key: &str) -> PathBuf {
        self.asset_dir.join(key)
    }
}
