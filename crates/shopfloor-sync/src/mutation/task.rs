//! Task mutations: execution clock and task edits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopfloor_core::{
    Actor, EntityKind, Error, ExecutionRecord, Job, JobId, Result, Task, TaskId, TaskPatch,
    TaskState,
};

use super::{Mutation, total_seconds};
use crate::remote::RemoteStore;

/// Starts a task clock, pausing whichever task was running.
#[derive(Debug, Clone)]
pub struct StartTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to start
    pub task_id: TaskId,
    /// Who starts it
    pub actor: Actor,
    /// Start instant
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for StartTask {
    /// Sessions closed on other tasks
    type Plan = Vec<ExecutionRecord>;
    type Output = Vec<ExecutionRecord>;

    fn name(&self) -> &'static str {
        "start_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        let outcome = job.start_task(self.task_id, &self.actor, self.at)?;
        Ok((!outcome.already_running).then_some(outcome.paused))
    }

    async fn commit(&self, remote: &dyn RemoteStore, plan: &Self::Plan, after: &Job) -> Result<Self::Output> {
        for record in plan {
            remote
                .stop_task_execution(record, total_seconds(after, record.task_id))
                .await?;
        }
        remote
            .start_task_execution(self.task_id, &self.actor, self.at)
            .await?;
        Ok(plan.clone())
    }
}

/// Stops a task clock without completing the task.
#[derive(Debug, Clone)]
pub struct StopTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to stop
    pub task_id: TaskId,
    /// Who stops it
    pub actor: Actor,
    /// Stop instant
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for StopTask {
    type Plan = ExecutionRecord;
    type Output = ExecutionRecord;

    fn name(&self) -> &'static str {
        "stop_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.stop_task(self.task_id, &self.actor, self.at)
    }

    async fn commit(&self, remote: &dyn RemoteStore, plan: &Self::Plan, after: &Job) -> Result<Self::Output> {
        remote
            .stop_task_execution(plan, total_seconds(after, self.task_id))
            .await?;
        Ok(plan.clone())
    }
}

/// Adds a task with a client-generated id.
#[derive(Debug, Clone)]
pub struct AddTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to insert
    pub task: Task,
    /// When it was added
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for AddTask {
    type Plan = ();
    type Output = Task;

    fn name(&self) -> &'static str {
        "add_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.add_task(self.task.clone(), self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.add_task(self.job_id, &self.task).await
    }
}

/// Edits task fields.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to edit
    pub task_id: TaskId,
    /// Fields to change
    pub patch: TaskPatch,
    /// When it was edited
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for UpdateTask {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "update_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.update_task(self.task_id, &self.patch, self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.update_task(self.task_id, &self.patch).await
    }
}

/// Deletes a task. A running session is discarded without a record.
#[derive(Debug, Clone)]
pub struct DeleteTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to delete
    pub task_id: TaskId,
    /// When it was deleted
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for DeleteTask {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.remove_task(self.task_id, self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.delete_task(self.task_id).await
    }
}

/// Marks a task done, stopping its clock first if it runs.
#[derive(Debug, Clone)]
pub struct CompleteTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to complete
    pub task_id: TaskId,
    /// Who completes it
    pub actor: Actor,
    /// Completion instant
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for CompleteTask {
    /// Session closed by the completion
    type Plan = Option<ExecutionRecord>;
    type Output = Option<ExecutionRecord>;

    fn name(&self) -> &'static str {
        "complete_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        let task = job
            .task(self.task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, self.task_id))?;
        if task.is_done() {
            return Ok(None);
        }
        job.complete_task(self.task_id, &self.actor, self.at)
            .map(Some)
    }

    async fn commit(&self, remote: &dyn RemoteStore, plan: &Self::Plan, after: &Job) -> Result<Self::Output> {
        if let Some(record) = plan {
            remote
                .stop_task_execution(record, total_seconds(after, self.task_id))
                .await?;
        }
        let patch = TaskPatch {
            state: Some(TaskState::Done),
            ..TaskPatch::default()
        };
        remote.update_task(self.task_id, &patch).await?;
        Ok(plan.clone())
    }
}

/// Moves a done task back to pending.
#[derive(Debug, Clone)]
pub struct ReopenTask {
    /// Owning job
    pub job_id: JobId,
    /// Task to reopen
    pub task_id: TaskId,
    /// When it was reopened
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for ReopenTask {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "reopen_task"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        let task = job
            .task(self.task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, self.task_id))?;
        if !task.is_done() {
            return Ok(None);
        }
        job.reopen_task(self.task_id, self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        let patch = TaskPatch {
            state: Some(TaskState::Pending),
            ..TaskPatch::default()
        };
        remote.update_task(self.task_id, &patch).await
    }
}
