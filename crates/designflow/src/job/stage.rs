//! The fixed stage list of the design pipeline and the typed results each
//! stage produces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::UnknownStage;

/// Identity of one pipeline stage.
///
/// The declaration order is the execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Upload,
    Segmentation,
    ConceptGeneration,
    PatternDrafting,
    FitSimulation,
    TechPack,
}

impl StageName {
    /// Every stage, in pipeline order.
    pub const ALL: [StageName; 6] = [
        StageName::Upload,
        StageName::Segmentation,
        StageName::ConceptGeneration,
        StageName::PatternDrafting,
        StageName::FitSimulation,
        StageName::TechPack,
    ];

    /// Position of this stage in [`StageName::ALL`].
    pub fn index(self) -> usize {
        match self {
            StageName::Upload => 0,
            StageName::Segmentation => 1,
            StageName::ConceptGeneration => 2,
            StageName::PatternDrafting => 3,
            StageName::FitSimulation => 4,
            StageName::TechPack => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Upload => "upload",
            StageName::Segmentation => "segmentation",
            StageName::ConceptGeneration => "concept_generation",
            StageName::PatternDrafting => "pattern_drafting",
            StageName::FitSimulation => "fit_simulation",
            StageName::TechPack => "tech_pack",
        }
    }

    /// Short human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            StageName::Upload => "Image Upload",
            StageName::Segmentation => "Garment Segmentation",
            StageName::ConceptGeneration => "Concept Generation",
            StageName::PatternDrafting => "Pattern Drafting",
            StageName::FitSimulation => "3D Fit Simulation",
            StageName::TechPack => "Tech Pack Generation",
        }
    }

    /// One-line description of the work the stage performs.
    pub fn description(self) -> &'static str {
        match self {
            StageName::Upload => "Processing uploaded images",
            StageName::Segmentation => "Identifying garment boundaries",
            StageName::ConceptGeneration => "Creating design variations",
            StageName::PatternDrafting => "Generating sewing patterns",
            StageName::FitSimulation => "Running fit simulation",
            StageName::TechPack => "Creating technical specifications",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Output of a completed stage, one shape per stage.
///
/// Values are storage keys of produced artifacts; the core never interprets
/// them beyond carrying them to consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageResult {
    Upload {
        garment_image: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style_swatch_image: Option<String>,
    },
    Segmentation {
        mask: String,
    },
    ConceptGeneration {
        concepts: Vec<String>,
    },
    PatternDrafting {
        pattern: String,
    },
    FitSimulation {
        simulation: String,
    },
    TechPack {
        tech_pack: String,
    },
}

impl StageResult {
    /// The stage this result belongs to.
    pub fn stage(&self) -> StageName {
        match self {
            StageResult::Upload { .. } => StageName::Upload,
            StageResult::Segmentation { .. } => StageName::Segmentation,
            StageResult::ConceptGeneration { .. } => StageName::ConceptGeneration,
            StageResult::PatternDrafting { .. } => StageName::PatternDrafting,
            StageResult::FitSimulation { .. } => StageName::FitSimulation,
            StageResult::TechPack { .. } => StageName::TechPack,
        }
    }
}
