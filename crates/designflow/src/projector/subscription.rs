use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProjectorError;
use crate::job::{DesignJob, JobId, JobStatus, StageName};
use crate::store::{JobReader, JobSubscription, NotificationError};

use super::view::ProgressView;

/// Shown when a job fails without recording a message.
pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred during processing";

type UpdateFn = Box<dyn FnMut(&ProgressView) + Send>;
type CompleteFn = Box<dyn FnOnce(&DesignJob) + Send>;
type ErrorFn = Box<dyn FnOnce(&str) + Send>;

/// Callbacks for one followed job.
///
/// Handlers run with the subscription's state locked and must not call back
/// into the [`ProjectorSubscription`] they belong to.
pub struct ProgressHandlers {
    on_update: UpdateFn,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl ProgressHandlers {
    pub fn new(on_update: impl FnMut(&ProgressView) + Send + 'static) -> Self {
        Self {
            on_update: Box::new(on_update),
            on_complete: None,
            on_error: None,
        }
    }

    /// Called once with the final job when it completes.
    pub fn on_complete(mut self, f: impl FnOnce(&DesignJob) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called once with the job's error message when it fails.
    pub fn on_error(mut self, f: impl FnOnce(&str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

struct ProjectorState {
    view: ProgressView,
    handlers: Option<ProgressHandlers>,
    last_revision: Option<u64>,
}

impl ProjectorState {
    /// Reconciles `job` and fires whichever handlers apply.
    ///
    /// Records with a lower revision than the last one applied are dropped so
    /// a re-read after lag cannot be undone by stale buffered notifications.
    fn apply(&mut self, job: &DesignJob, initial: bool) {
        if self.last_revision.is_some_and(|seen| job.revision < seen) {
            return;
        }
        self.last_revision = Some(job.revision);

        let changed = self.view.reconcile(job);
        let Some(handlers) = self.handlers.as_mut() else {
            return;
        };

        if changed || initial {
            (handlers.on_update)(&self.view);
        }
        match job.status {
            JobStatus::Completed => {
                if let Some(on_complete) = handlers.on_complete.take() {
                    handlers.on_error = None;
                    on_complete(job);
                }
            }
            JobStatus::Error => {
                if let Some(on_error) = handlers.on_error.take() {
                    handlers.on_complete = None;
                    on_error(job.error_message.as_deref().unwrap_or(FALLBACK_ERROR_MESSAGE));
                }
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }
    }
}

fn lock(state: &Mutex<ProjectorState>) -> MutexGuard<'_, ProjectorState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Projector state lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Follows jobs through a [`JobReader`] and keeps a [`ProgressView`] of each.
pub struct ProgressProjector {
    store: Arc<dyn JobReader>,
    stages: Vec<StageName>,
}

impl ProgressProjector {
    pub fn new(store: Arc<dyn JobReader>) -> Self {
        Self {
            store,
            stages: StageName::ALL.to_vec(),
        }
    }

    /// Restricts the views this projector builds to `stages`.
    pub fn with_stages(mut self, stages: &[StageName]) -> Self {
        self.stages = stages.to_vec();
        self
    }

    /// Starts following `job_id`.
    ///
    /// The feed is opened before the snapshot is read, so no write can fall
    /// between the two. `on_update` fires for the snapshot before this
    /// returns, and afterwards only when the view changes. Must be called
    /// within a Tokio runtime.
    pub fn subscribe(
        &self,
        job_id: &JobId,
        handlers: ProgressHandlers,
    ) -> Result<ProjectorSubscription, ProjectorError> {
        let runtime = Handle::try_current().map_err(|_| ProjectorError::NoRuntime)?;

        let feed = self.store.subscribe(job_id)?;
        let snapshot = self.store.get_job(job_id)?;

        let state = Arc::new(Mutex::new(ProjectorState {
            view: ProgressView::with_stages(*job_id, &self.stages),
            handlers: Some(handlers),
            last_revision: None,
        }));
        lock(&state).apply(&snapshot, true);

        debug!(job_id = %job_id, status = %snapshot.status, "Following job");
        let task = runtime.spawn(follow(feed, Arc::clone(&self.store), Arc::clone(&state)));

        Ok(ProjectorSubscription {
            job_id: *job_id,
            state,
            task: Some(task),
        })
    }
}

async fn follow(
    mut feed: JobSubscription,
    store: Arc<dyn JobReader>,
    state: Arc<Mutex<ProjectorState>>,
) {
    let job_id = feed.job_id();
    loop {
        match feed.recv().await {
            Ok(job) => lock(&state).apply(&job, false),
            Err(NotificationError::Lagged(missed)) => {
                warn!(job_id = %job_id, missed, "Projector fell behind, re-reading job");
                let closed = drain(&mut feed);
                match store.get_job(&job_id) {
                    Ok(job) => lock(&state).apply(&job, false),
                    Err(e) => warn!(job_id = %job_id, error = %e, "Re-read after lag failed"),
                }
                if closed {
                    break;
                }
            }
            Err(NotificationError::Closed) => break,
        }
    }
    debug!(job_id = %job_id, "Job feed closed");
}

/// Discards buffered notifications. Returns true if the feed has closed.
fn drain(feed: &mut JobSubscription) -> bool {
    loop {
        match feed.try_recv() {
            Ok(Some(_)) | Err(NotificationError::Lagged(_)) => continue,
            Ok(None) => return false,
            Err(NotificationError::Closed) => return true,
        }
    }
}

/// A live projection of one job. Dropping it unsubscribes.
pub struct ProjectorSubscription {
    job_id: JobId,
    state: Arc<Mutex<ProjectorState>>,
    task: Option<JoinHandle<()>>,
}

impl ProjectorSubscription {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Copy of the current view.
    pub fn view(&self) -> ProgressView {
        lock(&self.state).view.clone()
    }

    pub fn overall_progress(&self) -> u8 {
        lock(&self.state).view.overall_progress()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).handlers.is_some()
    }

    /// Stops delivery. No handler runs after this returns. Calling it again
    /// does nothing.
    pub fn unsubscribe(&mut self) {
        lock(&self.state).handlers = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Waits until the job's feed closes, which happens once the job is
    /// finished, and returns the final view.
    pub async fn wait(mut self) -> ProgressView {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(job_id = %self.job_id, "Progress handler panicked");
                }
            }
        }
        self.view()
    }
}

impl Drop for ProjectorSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
