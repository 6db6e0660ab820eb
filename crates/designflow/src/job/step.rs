use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TransitionError;
use super::stage::{StageName, StageResult};

/// Status of a single pipeline step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Processing => "processing",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
        }
    }

    /// Steps only move forward: `pending → processing → completed | error`.
    /// Rewriting the current status is allowed so repeated writes stay idempotent.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Processing)
                | (StepStatus::Processing, StepStatus::Completed)
                | (StepStatus::Processing, StepStatus::Error)
        ) || self == next
    }

    pub fn is_finished(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted status record for one stage of one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// Stage identity; the reconciliation key.
    pub name: StageName,
    pub status: StepStatus,
    /// 0–100, meaningful while `status` is processing.
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set on the first transition into processing, never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn pending(name: StageName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            progress: 0,
            result_data: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Applies a patch addressed to this step.
    ///
    /// The step is left untouched when the patch is rejected.
    pub fn apply(&mut self, patch: &StepPatch, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let next = patch.status.unwrap_or(self.status);

        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Step {
                stage: self.name,
                from: self.status,
                to: next,
            });
        }
        if let Some(ref result) = patch.result_data {
            if result.stage() != self.name {
                return Err(TransitionError::ResultMismatch {
                    stage: self.name,
                    produced_by: result.stage(),
                });
            }
            if next != StepStatus::Completed {
                return Err(TransitionError::ResultBeforeCompletion { stage: self.name });
            }
        }
        if patch.progress.is_some() && !matches!(next, StepStatus::Processing | StepStatus::Completed)
        {
            return Err(TransitionError::ProgressOutsideProcessing { stage: self.name });
        }
        if patch.error_message.is_some() && next != StepStatus::Error {
            return Err(TransitionError::MessageWithoutError);
        }

        self.status = next;
        match next {
            StepStatus::Pending => {}
            StepStatus::Processing => {
                self.started_at.get_or_insert(now);
                if let Some(progress) = patch.progress {
                    self.progress = progress.min(100);
                }
            }
            StepStatus::Completed => {
                self.completed_at.get_or_insert(now);
                self.progress = 100;
                if let Some(ref result) = patch.result_data {
                    self.result_data = Some(result.clone());
                }
            }
            StepStatus::Error => {
                self.progress = 0;
                if let Some(ref message) = patch.error_message {
                    self.error_message = Some(message.clone());
                }
            }
        }

        Ok(())
    }
}

/// Partial update for one step, addressed by stage identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepPatch {
    pub name: StageName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepPatch {
    fn empty(name: StageName) -> Self {
        Self {
            name,
            status: None,
            progress: None,
            result_data: None,
            error_message: None,
        }
    }

    /// Moves the step into processing with zero progress.
    pub fn started(name: StageName) -> Self {
        Self {
            status: Some(StepStatus::Processing),
            progress: Some(0),
            ..Self::empty(name)
        }
    }

    /// Progress increment; leaves the status unchanged.
    pub fn progress(name: StageName, percent: u8) -> Self {
        Self {
            progress: Some(percent.min(100)),
            ..Self::empty(name)
        }
    }

    pub fn completed(name: StageName, result: StageResult) -> Self {
        Self {
            status: Some(StepStatus::Completed),
            progress: Some(100),
            result_data: Some(result),
            ..Self::empty(name)
        }
    }

    pub fn failed(name: StageName, message: impl Into<String>) -> Self {
        Self {
            status: Some(StepStatus::Error),
            error_message: Some(message.into()),
            ..Self::empty(name)
        }
    }
}

/// Integer completion percentage, rounded to the nearest whole number.
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 100 + total / 2) / total) as u8
}
