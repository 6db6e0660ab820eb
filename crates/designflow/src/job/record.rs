use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::TransitionError;
use super::stage::StageName;
use super::step::{completion_percent, Step, StepPatch, StepStatus};

/// Opaque, immutable identifier of a design job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Aggregate status of a design job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// A pending job may fail before processing starts (asset upload).
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Error)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
        ) || self == next
    }

    /// Returns true once the job can no longer change.
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One submitted design request and its aggregate state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DesignJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Index of the most recently started or updated step.
    pub current_step_index: usize,
    /// Always the six pipeline stages, in order.
    pub steps: Vec<Step>,
    pub design_prompt: String,
    /// Storage key of the uploaded garment photograph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garment_image: Option<String>,
    /// Storage key of the optional style swatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_swatch_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of committed changes. Increases by one with every applied patch.
    #[serde(default)]
    pub revision: u64,
}

impl DesignJob {
    /// Creates a pending job with every step pending.
    pub fn new(design_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            current_step_index: 0,
            steps: StageName::ALL.into_iter().map(Step::pending).collect(),
            design_prompt: design_prompt.into(),
            garment_image: None,
            style_swatch_image: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            revision: 0,
        }
    }

    pub fn step(&self, stage: StageName) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == stage)
    }

    /// The step that failed, if any.
    pub fn failed_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status == StepStatus::Error)
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Percentage of completed steps.
    pub fn overall_progress(&self) -> u8 {
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        completion_percent(completed, self.steps.len())
    }

    /// Applies a partial update.
    ///
    /// Either the whole patch is applied or, on error, nothing changes.
    pub fn apply(&mut self, patch: &JobPatch, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status.is_finished() {
            return Err(TransitionError::JobFinished {
                id: self.id,
                status: self.status,
            });
        }

        let mut next = self.clone();

        if let Some(ref step_patch) = patch.step {
            next.apply_step(step_patch, now)?;
        }
        if let Some(status) = patch.status {
            next.transition(status)?;
        }
        if let Some(ref message) = patch.error_message {
            if next.status != JobStatus::Error {
                return Err(TransitionError::MessageWithoutError);
            }
            next.error_message = Some(message.clone());
        }
        if let Some(ref key) = patch.garment_image {
            next.garment_image = Some(key.clone());
        }
        if let Some(ref key) = patch.style_swatch_image {
            next.style_swatch_image = Some(key.clone());
        }
        if next.status == JobStatus::Completed {
            next.completed_at.get_or_insert(now);
        }
        next.updated_at = now;
        next.revision += 1;

        *self = next;
        Ok(())
    }

    fn apply_step(&mut self, patch: &StepPatch, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.name == patch.name)
            .ok_or(TransitionError::MissingStep { stage: patch.name })?;

        let current = self
            .steps
            .get(self.current_step_index)
            .ok_or(TransitionError::StepIndexOutOfRange {
                index: self.current_step_index,
            })?;
        if index < self.current_step_index {
            return Err(TransitionError::StepRegression {
                stage: patch.name,
                current: current.name,
            });
        }
        if patch.status == Some(StepStatus::Processing) {
            if let Some(running) = self
                .steps
                .iter()
                .find(|s| s.status == StepStatus::Processing && s.name != patch.name)
            {
                return Err(TransitionError::ConcurrentStep {
                    stage: patch.name,
                    running: running.name,
                });
            }
        }

        self.steps[index].apply(patch, now)?;
        self.current_step_index = index;
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::Job {
                from: self.status,
                to,
            });
        }
        match to {
            JobStatus::Completed => {
                if let Some(step) = self
                    .steps
                    .iter()
                    .find(|s| s.status != StepStatus::Completed)
                {
                    return Err(TransitionError::IncompleteSteps {
                        stage: step.name,
                        status: step.status,
                    });
                }
            }
            JobStatus::Error => {
                if self.failed_step().is_none() {
                    return Err(TransitionError::NoFailedStep);
                }
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
        self.status = to;
        Ok(())
    }
}

/// Partial update of a job record.
///
/// Each patch is one store write and one change notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garment_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_swatch_image: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn step(step: StepPatch) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    /// Marks the job as failed with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Records the storage keys of uploaded assets.
    pub fn assets(garment_image: String, style_swatch_image: Option<String>) -> Self {
        Self {
            garment_image: Some(garment_image),
            style_swatch_image,
            ..Default::default()
        }
    }
}
