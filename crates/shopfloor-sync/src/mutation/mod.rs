//! Mutation kinds run by the dispatcher.
//!
//! A mutation is a pure transform of one job plus the remote calls that make
//! the change durable. Caching, rollback and reconciliation are not its
//! concern.

use async_trait::async_trait;
use shopfloor_core::{Job, JobId, Result, TaskId};

use crate::remote::RemoteStore;

mod job;
mod reminder;
mod task;

pub use job::{DeliverJob, OverrideStatus, UpdateJob};
pub use reminder::{AddReminder, DeleteReminder, SetReminderStatus, UpdateReminder};
pub use task::{AddTask, CompleteTask, DeleteTask, ReopenTask, StartTask, StopTask, UpdateTask};

/// One optimistic change to a job.
#[async_trait]
pub trait Mutation: Send + Sync {
    /// What the transform hands to [`Mutation::commit`], e.g. closed sessions.
    type Plan: Send + Sync;
    /// What the caller gets back on success.
    type Output: Send;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Job the mutation applies to.
    fn job_id(&self) -> JobId;

    /// Applies the change to a copy of the job.
    ///
    /// Returns `Ok(None)` when there is nothing to do. The copy is discarded
    /// on error or `None`, so partial edits never reach the cache.
    ///
    /// # Errors
    /// Returns `InvalidState` or `NotFound` when the change is not allowed.
    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>>;

    /// Sends the change to the remote store. `after` is the optimistic job.
    ///
    /// # Errors
    /// Returns the remote error; the dispatcher rolls back.
    async fn commit(&self, remote: &dyn RemoteStore, plan: &Self::Plan, after: &Job) -> Result<Self::Output>;
}

/// Accumulated seconds of a task in the optimistic job, sent with stop calls.
fn total_seconds(job: &Job, task_id: TaskId) -> u64 {
    job.task(task_id)
        .map_or(0, |task| task.time_spent_seconds)
}
