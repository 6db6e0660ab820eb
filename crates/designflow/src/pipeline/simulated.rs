//! Stand-in stage executors that wait a configured delay and return canned
//! artifact keys. Real workers implement [`StageExecutor`] the same way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::SimulationConfig;
use crate::job::{JobId, StageName, StageResult};
use crate::storage::AssetStorage;

use super::context::StageContext;
use super::error::StageError;
use super::progress::ProgressReporter;
use super::stage::StageExecutor;

/// Canned output keys for a job, one shape per stage.
fn canned_result(stage: StageName, ctx: &StageContext) -> StageResult {
    let id: &JobId = &ctx.job_id;
    match stage {
        StageName::Upload => StageResult::Upload {
            garment_image: ctx
                .garment_image
                .clone()
                .unwrap_or_else(|| format!("{}/garment.png", id)),
            style_swatch_image: ctx.style_swatch_image.clone(),
        },
        StageName::Segmentation => StageResult::Segmentation {
            mask: format!("{}/segmentation_mask.png", id),
        },
        StageName::ConceptGeneration => StageResult::ConceptGeneration {
            concepts: (1..=3)
                .map(|n| format!("{}/concepts/concept_{}.png", id, n))
                .collect(),
        },
        StageName::PatternDrafting => StageResult::PatternDrafting {
            pattern: format!("{}/pattern.svg", id),
        },
        StageName::FitSimulation => StageResult::FitSimulation {
            simulation: format!("{}/fit_simulation.glb", id),
        },
        StageName::TechPack => StageResult::TechPack {
            tech_pack: format!("{}/tech_pack.pdf", id),
        },
    }
}

/// Sleeps through `step_delay`, reporting evenly spaced progress, then
/// succeeds with a canned payload.
pub struct SimulatedStage {
    stage: StageName,
    step_delay: Duration,
    progress_ticks: u32,
}

impl SimulatedStage {
    pub fn new(stage: StageName, config: &SimulationConfig) -> Self {
        Self {
            stage,
            step_delay: config.step_delay(),
            progress_ticks: config.progress_ticks,
        }
    }
}

#[async_trait]
impl StageExecutor for SimulatedStage {
    fn stage(&self) -> StageName {
        self.stage
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        progress: &dyn ProgressReporter,
    ) -> Result<StageResult, StageError> {
        let ticks = self.progress_ticks.max(1);
        let pause = self.step_delay / ticks;

        for tick in 1..=ticks {
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            // The final tick is reported by the completion write.
            if tick < ticks {
                progress.report((tick * 100 / ticks) as u8);
            }
        }

        Ok(canned_result(self.stage, ctx))
    }
}

/// Confirms that the assets recorded on the job are present in storage.
pub struct UploadStage {
    assets: Arc<dyn AssetStorage>,
}

impl UploadStage {
    pub fn new(assets: Arc<dyn AssetStorage>) -> Self {
        Self { assets }
    }

    fn check(&self, key: &str, what: &str) -> Result<(), StageError> {
        if self.assets.exists(key) {
            Ok(())
        } else {
            Err(StageError::new(format!("Uploaded {} is missing", what)))
        }
    }
}

#[async_trait]
impl StageExecutor for UploadStage {
    fn stage(&self) -> StageName {
        StageName::Upload
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        _progress: &dyn ProgressReporter,
    ) -> Result<StageResult, StageError> {
        let garment_image = ctx
            .garment_image
            .clone()
            .ok_or_else(|| StageError::new("No garment image was uploaded"))?;
        self.check(&garment_image, "garment image")?;
        if let Some(ref swatch) = ctx.style_swatch_image {
            self.check(swatch, "style swatch image")?;
        }

        Ok(StageResult::Upload {
            garment_image,
            style_swatch_image: ctx.style_swatch_image.clone(),
        })
    }
}

/// Always fails with a fixed message.
pub struct FailingStage {
    stage: StageName,
    message: String,
}

impl FailingStage {
    pub fn new(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[async_trait]
impl StageExecutor for FailingStage {
    fn stage(&self) -> StageName {
        self.stage
    }

    async fn execute(
        &self,
        _ctx: &StageContext,
        _progress: &dyn ProgressReporter,
    ) -> Result<StageResult, StageError> {
        Err(StageError::new(self.message.clone()))
    }
}

/// The full simulated pipeline: a real upload check followed by five
/// simulated stages.
pub fn simulated_stages(
    config: &SimulationConfig,
    assets: Arc<dyn AssetStorage>,
) -> Vec<Arc<dyn StageExecutor>> {
    let mut stages: Vec<Arc<dyn StageExecutor>> = vec![Arc::new(UploadStage::new(assets))];
    for stage in &StageName::ALL[1..] {
        stages.push(Arc::new(SimulatedStage::new(*stage, config)));
    }
    stages
}

/// Swaps in `executor` for the stage it drives.
pub fn replace_stage(stages: &mut [Arc<dyn StageExecutor>], executor: Arc<dyn StageExecutor>) {
    let target = executor.stage();
    if let Some(slot) = stages.iter_mut().find(|s| s.stage() == target) {
        *slot = executor;
    }
}
