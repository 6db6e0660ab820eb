//! Job store with optional SQLite persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::notifier::{JobNotifier, JobSubscription};
use super::{JobReader, JobWriter};
use crate::db::design_repo::{self, DesignFilter, DesignRow};
use crate::db::{Database, DatabaseError};
use crate::job::{DesignJob, JobId, JobPatch, JobStatus, StageName, Step, StepStatus};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Checks the shape every stored record must have: the six pipeline stages
/// in order and a step index that points into them.
fn check_shape(steps: &[Step], current_step_index: usize) -> Result<(), String> {
    if steps.iter().map(|s| s.name).ne(StageName::ALL) {
        return Err("step list does not match the pipeline stages".to_string());
    }
    if current_step_index >= steps.len() {
        return Err(format!("step index {} out of range", current_step_index));
    }
    Ok(())
}

/// Checks a record offered to `create_job`.
fn check_new_job(job: &DesignJob) -> Result<(), String> {
    check_shape(&job.steps, job.current_step_index)?;
    if job.status != JobStatus::Pending {
        return Err(format!("new jobs must be pending, got {}", job.status));
    }
    if let Some(step) = job.steps.iter().find(|s| s.status != StepStatus::Pending) {
        return Err(format!("step {} is already {}", step.name, step.status));
    }
    Ok(())
}

fn row_from_job(job: &DesignJob) -> Result<DesignRow, DatabaseError> {
    Ok(DesignRow {
        id: job.id.to_string(),
        status: job.status.as_str().to_string(),
        current_step_index: job.current_step_index as i64,
        steps: serde_json::to_string(&job.steps)?,
        design_prompt: job.design_prompt.clone(),
        garment_image: job.garment_image.clone(),
        style_swatch_image: job.style_swatch_image.clone(),
        error_message: job.error_message.clone(),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
        completed_at: job.completed_at.map(format_timestamp),
        revision: i64::try_from(job.revision).unwrap_or(i64::MAX),
    })
}

fn job_from_row(row: &DesignRow) -> Result<DesignJob, DatabaseError> {
    let corrupt = |reason: String| DatabaseError::CorruptRow {
        id: row.id.clone(),
        reason,
    };

    let id: JobId = row.id.parse().map_err(|e: uuid::Error| corrupt(e.to_string()))?;
    let status: JobStatus = row.status.parse().map_err(corrupt)?;
    let steps: Vec<Step> =
        serde_json::from_str(&row.steps).map_err(|e| corrupt(e.to_string()))?;
    let current_step_index = usize::try_from(row.current_step_index)
        .map_err(|_| corrupt(format!("step index {} out of range", row.current_step_index)))?;
    check_shape(&steps, current_step_index).map_err(corrupt)?;
    let revision = u64::try_from(row.revision)
        .map_err(|_| corrupt(format!("negative revision {}", row.revision)))?;

    let timestamp = |s: &str| parse_timestamp(s).map_err(|e| corrupt(format!("'{}': {}", s, e)));

    Ok(DesignJob {
        id,
        status,
        current_step_index,
        steps,
        design_prompt: row.design_prompt.clone(),
        garment_image: row.garment_image.clone(),
        style_swatch_image: row.style_swatch_image.clone(),
        error_message: row.error_message.clone(),
        created_at: timestamp(&row.created_at)?,
        updated_at: timestamp(&row.updated_at)?,
        completed_at: row.completed_at.as_deref().map(timestamp).transpose()?,
        revision,
    })
}

// ─── Query types ────────────────────────────────────────────────────────────

/// Query parameters for job listing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct JobQueryParams {
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Response for job listing with pagination.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<DesignJob>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Number of jobs per status.
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub error: u64,
}

impl StatusCounts {
    fn add(&mut self, status: JobStatus, n: u64) {
        match status {
            JobStatus::Pending => self.pending += n,
            JobStatus::Processing => self.processing += n,
            JobStatus::Completed => self.completed += n,
            JobStatus::Error => self.error += n,
        }
    }
}

// ─── JobStore ───────────────────────────────────────────────────────────────

struct StoreState {
    cache: HashMap<JobId, DesignJob>,
    notifier: JobNotifier,
}

/// In-memory job store with per-job change feeds, optionally backed by
/// rusqlite.
///
/// A write is applied, persisted and broadcast while the state lock is held,
/// so every subscriber sees changes in commit order.
pub struct JobStore {
    /// Database handle (clone is cheap, inner `Arc`).
    db: RwLock<Option<Database>>,
    state: RwLock<StoreState>,
}

impl JobStore {
    /// Creates an empty store. `notification_capacity` bounds how many
    /// unread changes a subscriber may fall behind before it lags.
    pub fn new(notification_capacity: usize) -> Self {
        Self {
            db: RwLock::new(None),
            state: RwLock::new(StoreState {
                cache: HashMap::new(),
                notifier: JobNotifier::new(notification_capacity),
            }),
        }
    }

    /// Sets the database connection.
    pub fn set_database(&self, db: Database) {
        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
    }

    /// Gets a cloned database handle if available.
    pub fn get_database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Writes the committed record to the database, if one is attached.
    fn persist(&self, job: &DesignJob, insert: bool) {
        let Some(db) = self.get_database() else {
            return;
        };
        let result = row_from_job(job).and_then(|row| {
            if insert {
                design_repo::insert(&db, &row)
            } else {
                design_repo::update(&db, &row).and_then(|changed| {
                    if changed == 0 {
                        design_repo::insert(&db, &row)
                    } else {
                        Ok(())
                    }
                })
            }
        });
        if let Err(e) = result {
            log::error!("Failed to persist design job {}: {}", job.id, e);
        }
    }

    /// Ensures the job is in the cache, reading it from the database on a
    /// miss.
    fn ensure_cached(&self, id: &JobId) -> Result<(), StoreError> {
        if self.read_state().cache.contains_key(id) {
            return Ok(());
        }
        let db = self.get_database().ok_or(StoreError::NotFound(*id))?;
        let row = design_repo::find_by_id(&db, &id.to_string())?
            .ok_or(StoreError::NotFound(*id))?;
        let job = job_from_row(&row)?;

        self.write_state().cache.entry(job.id).or_insert(job);
        Ok(())
    }

    /// Loads recent and unfinished jobs from the database into the cache.
    /// Returns how many records were added.
    pub fn load_from_database(&self) -> Result<usize, StoreError> {
        let Some(db) = self.get_database() else {
            return Ok(0);
        };

        let mut rows = Vec::new();
        for status in [JobStatus::Pending, JobStatus::Processing] {
            let (found, _) = design_repo::query(
                &db,
                &DesignFilter {
                    status: Some(status.as_str().to_string()),
                    limit: Some(u32::MAX as u64),
                    ..Default::default()
                },
            )?;
            rows.extend(found);
        }
        let (recent, _) = design_repo::query(
            &db,
            &DesignFilter {
                limit: Some(100),
                ..Default::default()
            },
        )?;
        rows.extend(recent);

        let mut loaded = 0;
        let mut state = self.write_state();
        for row in &rows {
            match job_from_row(row) {
                Ok(job) => {
                    if !state.cache.contains_key(&job.id) {
                        state.cache.insert(job.id, job);
                        loaded += 1;
                    }
                }
                Err(e) => log::warn!("Skipping unreadable design row: {}", e),
            }
        }

        log::info!("Loaded {} design jobs from database into cache", loaded);
        Ok(loaded)
    }

    /// Lists jobs newest first, preferring the database when available.
    pub fn list(&self, params: &JobQueryParams) -> Result<JobListResponse, StoreError> {
        let Some(db) = self.get_database() else {
            return Ok(self.list_cache(params));
        };

        let filter = DesignFilter {
            status: params.status.map(|s| s.as_str().to_string()),
            limit: params.limit,
            offset: params.offset,
            ..Default::default()
        };
        let (rows, total) = design_repo::query(&db, &filter)?;
        let jobs = rows
            .iter()
            .filter_map(|row| match job_from_row(row) {
                Ok(job) => Some(job),
                Err(e) => {
                    log::warn!("Skipping unreadable design row: {}", e);
                    None
                }
            })
            .collect();

        Ok(JobListResponse {
            jobs,
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    fn list_cache(&self, params: &JobQueryParams) -> JobListResponse {
        let state = self.read_state();
        let mut jobs: Vec<DesignJob> = state
            .cache
            .values()
            .filter(|j| params.status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        drop(state);

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = jobs.len() as u64;
        let offset = params.offset.unwrap_or(0) as usize;
        let limit = params.limit.unwrap_or(100) as usize;
        let jobs = jobs.into_iter().skip(offset).take(limit).collect();

        JobListResponse {
            jobs,
            total,
            limit: params.limit,
            offset: params.offset,
        }
    }

    /// Returns per-status totals, from the database when available.
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();

        if let Some(db) = self.get_database() {
            for status in [
                JobStatus::Pending,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Error,
            ] {
                match design_repo::count_by_status(&db, status.as_str()) {
                    Ok(n) => counts.add(status, n),
                    Err(e) => log::error!("Failed to count {} jobs: {}", status, e),
                }
            }
            return counts;
        }

        for job in self.read_state().cache.values() {
            counts.add(job.status, 1);
        }
        counts
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(64)
    }
}

impl JobReader for JobStore {
    fn get_job(&self, id: &JobId) -> Result<DesignJob, StoreError> {
        self.ensure_cached(id)?;
        self.read_state()
            .cache
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }

    fn subscribe(&self, id: &JobId) -> Result<JobSubscription, StoreError> {
        self.ensure_cached(id)?;
        let mut state = self.write_state();
        let StoreState { cache, notifier } = &mut *state;
        let job = cache.get(id).ok_or(StoreError::NotFound(*id))?;
        Ok(notifier.subscribe(job))
    }
}

impl JobWriter for JobStore {
    fn create_job(&self, job: DesignJob) -> Result<JobId, StoreError> {
        check_new_job(&job).map_err(|reason| StoreError::InvalidRecord { id: job.id, reason })?;

        let mut state = self.write_state();
        if state.cache.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        if let Some(db) = self.get_database() {
            if design_repo::find_by_id(&db, &job.id.to_string())?.is_some() {
                return Err(StoreError::AlreadyExists(job.id));
            }
        }

        let id = job.id;
        self.persist(&job, true);
        state.cache.insert(id, job);

        log::debug!("Created design job {}", id);
        Ok(id)
    }

    fn update_job(&self, id: &JobId, patch: JobPatch) -> Result<DesignJob, StoreError> {
        self.ensure_cached(id)?;

        let mut state = self.write_state();
        let StoreState { cache, notifier } = &mut *state;
        let job = cache.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        job.apply(&patch, Utc::now())?;
        let committed = job.clone();

        self.persist(&committed, false);
        notifier.publish(&committed);

        Ok(committed)
    }
}
