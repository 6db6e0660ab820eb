//! Local, read-only projection of a job's progress.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::job::{completion_percent, DesignJob, JobId, JobStatus, StageName, Step, StepStatus};

/// Display state of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub name: StageName,
    pub status: StepStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepView {
    pub fn pending(name: StageName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            progress: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn title(&self) -> &'static str {
        self.name.title()
    }

    /// Copies the mutable fields of `step`. Returns true if anything changed.
    fn overwrite(&mut self, step: &Step) -> bool {
        let next = Self {
            name: self.name,
            status: step.status,
            progress: step.progress.min(100),
            error_message: step.error_message.clone(),
            started_at: step.started_at,
            completed_at: step.completed_at,
        };
        if *self == next {
            return false;
        }
        *self = next;
        true
    }
}

/// Ordered step views for one job plus its aggregate status.
///
/// Never mutates the job; only [`reconcile`](Self::reconcile) and
/// [`reconcile_value`](Self::reconcile_value) change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Stage the job most recently started or updated.
    pub current_stage: Option<StageName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub steps: Vec<StepView>,
}

impl ProgressView {
    /// View over all six stages.
    pub fn new(job_id: JobId) -> Self {
        Self::with_stages(job_id, &StageName::ALL)
    }

    /// View over a chosen subset of stages, in the given order.
    pub fn with_stages(job_id: JobId, stages: &[StageName]) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            current_stage: None,
            error_message: None,
            steps: stages.iter().copied().map(StepView::pending).collect(),
        }
    }

    pub fn step(&self, stage: StageName) -> Option<&StepView> {
        self.steps.iter().find(|s| s.name == stage)
    }

    /// Completed steps over total steps, rounded to a whole percentage.
    pub fn overall_progress(&self) -> u8 {
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        completion_percent(completed, self.steps.len())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Merges a job record into the view by step identity.
    ///
    /// Steps the view does not track are ignored, as are records of other
    /// jobs. Applying the same record twice is the same as applying it once.
    /// Returns true if the view changed.
    pub fn reconcile(&mut self, job: &DesignJob) -> bool {
        if job.id != self.job_id {
            return false;
        }

        let mut changed = false;
        for step in &job.steps {
            if let Some(view) = self.steps.iter_mut().find(|v| v.name == step.name) {
                changed |= view.overwrite(step);
            }
        }

        let current_stage = job.steps.get(job.current_step_index).map(|s| s.name);
        changed |= replace(&mut self.status, job.status);
        changed |= replace(&mut self.current_stage, current_stage);
        changed |= replace(&mut self.error_message, job.error_message.clone());
        changed
    }

    /// Lenient variant of [`reconcile`](Self::reconcile) for loosely typed
    /// payloads. Malformed or unknown fields are skipped; absent fields keep
    /// their current value.
    pub fn reconcile_value(&mut self, record: &Value) -> bool {
        let mut changed = false;

        if let Some(status) = record
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<JobStatus>().ok())
        {
            changed |= replace(&mut self.status, status);
        }
        if let Some(message) = record.get("error_message") {
            changed |= replace(&mut self.error_message, message.as_str().map(str::to_string));
        }

        let steps = record.get("steps").and_then(Value::as_array);
        for entry in steps.into_iter().flatten() {
            let Some(stage) = entry
                .get("name")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<StageName>().ok())
            else {
                continue;
            };
            let Some(view) = self.steps.iter_mut().find(|v| v.name == stage) else {
                continue;
            };

            let mut next = view.clone();
            if let Some(status) = entry
                .get("status")
                .and_then(Value::as_str)
                .and_then(parse_step_status)
            {
                next.status = status;
            }
            if let Some(progress) = entry.get("progress").and_then(Value::as_u64) {
                next.progress = progress.min(100) as u8;
            }
            if let Some(message) = entry.get("error_message") {
                next.error_message = message.as_str().map(str::to_string);
            }
            if let Some(ts) = entry.get("started_at") {
                next.started_at = parse_time(ts);
            }
            if let Some(ts) = entry.get("completed_at") {
                next.completed_at = parse_time(ts);
            }

            if *view != next {
                *view = next;
                changed = true;
            }
        }

        if let Some(index) = record.get("current_step_index").and_then(Value::as_u64) {
            let stage = StageName::ALL.get(index as usize).copied();
            if stage.is_some() {
                changed |= replace(&mut self.current_stage, stage);
            }
        }

        changed
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn parse_step_status(s: &str) -> Option<StepStatus> {
    serde_json::from_value(Value::String(s.to_string())).ok()
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
