//! Client-side progress projection.
//!
//! A [`ProgressProjector`] follows a job's change feed and keeps a
//! [`ProgressView`] reconciled with it, calling back into the UI layer as
//! the view changes.

mod subscription;
mod view;

pub use subscription::{
    ProgressHandlers, ProgressProjector, ProjectorSubscription, FALLBACK_ERROR_MESSAGE,
};
pub use view::{ProgressView, StepView};
