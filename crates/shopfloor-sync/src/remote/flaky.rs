//! Failure-injecting wrapper around another remote store.
//!
//! Used by rollback and concurrency tests: individual operations can be made
//! to fail, or be held until the test releases them so optimistic state can
//! be observed while a call is in flight.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopfloor_core::sync::IgnoreLock as _;
use shopfloor_core::{
    Actor, Error, ExecutionRecord, Job, JobFilter, JobId, JobPatch, Reminder, ReminderId,
    ReminderPatch, ReminderStatus, Result, Task, TaskId, TaskPatch,
};
use tokio::sync::Semaphore;

use super::RemoteStore;

/// One operation of the [`RemoteStore`] trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// `get_job`
    GetJob,
    /// `list_jobs`
    ListJobs,
    /// `update_job`
    UpdateJob,
    /// `add_task`
    AddTask,
    /// `update_task`
    UpdateTask,
    /// `delete_task`
    DeleteTask,
    /// `start_task_execution`
    StartTaskExecution,
    /// `stop_task_execution`
    StopTaskExecution,
    /// `task_executions`
    TaskExecutions,
    /// `add_reminder`
    AddReminder,
    /// `update_reminder`
    UpdateReminder,
    /// `set_reminder_status`
    SetReminderStatus,
    /// `delete_reminder`
    DeleteReminder,
}

impl RemoteOp {
    /// Whether the operation writes to the backend.
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::GetJob | Self::ListJobs | Self::TaskExecutions)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::GetJob => "get_job",
            Self::ListJobs => "list_jobs",
            Self::UpdateJob => "update_job",
            Self::AddTask => "add_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::StartTaskExecution => "start_task_execution",
            Self::StopTaskExecution => "stop_task_execution",
            Self::TaskExecutions => "task_executions",
            Self::AddReminder => "add_reminder",
            Self::UpdateReminder => "update_reminder",
            Self::SetReminderStatus => "set_reminder_status",
            Self::DeleteReminder => "delete_reminder",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct Faults {
    failing: HashSet<RemoteOp>,
    held: HashSet<RemoteOp>,
    calls: Vec<RemoteOp>,
}

/// Remote store that forwards to an inner store unless told to fail or wait.
pub struct FlakyRemote {
    inner: Arc<dyn RemoteStore>,
    faults: Mutex<Faults>,
    /// Permits released by the test, one per held call allowed through
    gate: Semaphore,
    /// One permit per held call that reached the gate
    arrivals: Semaphore,
}

impl FlakyRemote {
    /// Wraps `inner`; every call passes through until configured otherwise.
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            gate: Semaphore::new(0),
            arrivals: Semaphore::new(0),
        }
    }

    /// Makes every subsequent call of `op` fail with `RemoteFailure`.
    pub fn fail(&self, op: RemoteOp) {
        self.faults.lock_ignore_poison().failing.insert(op);
    }

    /// Makes every write operation fail.
    pub fn fail_writes(&self) {
        let mut faults = self.faults.lock_ignore_poison();
        for op in ALL_OPS {
            if op.is_write() {
                faults.failing.insert(op);
            }
        }
    }

    /// Lets `op` succeed again.
    pub fn heal(&self, op: RemoteOp) {
        self.faults.lock_ignore_poison().failing.remove(&op);
    }

    /// Lets every operation succeed again.
    pub fn heal_all(&self) {
        self.faults.lock_ignore_poison().failing.clear();
    }

    /// Makes calls of `op` wait until [`FlakyRemote::release`] lets them through.
    pub fn hold(&self, op: RemoteOp) {
        self.faults.lock_ignore_poison().held.insert(op);
    }

    /// Lets `count` held calls proceed.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Waits until a held call is parked at the gate.
    pub async fn wait_for_held_call(&self) {
        if let Ok(permit) = self.arrivals.acquire().await {
            permit.forget();
        }
    }

    /// Operations called so far, in order.
    pub fn calls(&self) -> Vec<RemoteOp> {
        self.faults.lock_ignore_poison().calls.clone()
    }

    /// Operations called so far that write to the backend.
    pub fn writes(&self) -> Vec<RemoteOp> {
        self.calls().into_iter().filter(|op| op.is_write()).collect()
    }

    async fn enter(&self, op: RemoteOp) -> Result<()> {
        let held = {
            let mut faults = self.faults.lock_ignore_poison();
            faults.calls.push(op);
            faults.held.contains(&op)
        };

        if held {
            self.arrivals.add_permits(1);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|error| Error::RemoteFailure(format!("{op} gate closed: {error}")))?;
            permit.forget();
        }

        if self.faults.lock_ignore_poison().failing.contains(&op) {
            tracing::debug!("Injecting failure into {op}");
            return Err(Error::RemoteFailure(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

const ALL_OPS: [RemoteOp; 13] = [
    RemoteOp::GetJob,
    RemoteOp::ListJobs,
    RemoteOp::UpdateJob,
    RemoteOp::AddTask,
    RemoteOp::UpdateTask,
    RemoteOp::DeleteTask,
    RemoteOp::StartTaskExecution,
    RemoteOp::StopTaskExecution,
    RemoteOp::TaskExecutions,
    RemoteOp::AddReminder,
    RemoteOp::UpdateReminder,
    RemoteOp::SetReminderStatus,
    RemoteOp::DeleteReminder,
];

#[async_trait]
impl RemoteStore for FlakyRemote {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<Job>> {
        self.enter(RemoteOp::GetJob).await?;
        self.inner.get_job(job_id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.enter(RemoteOp::ListJobs).await?;
        self.inner.list_jobs(filter).await
    }

    async fn update_job(&self, job_id: JobId, patch: &JobPatch) -> Result<()> {
        self.enter(RemoteOp::UpdateJob).await?;
        self.inner.update_job(job_id, patch).await
    }

    async fn add_task(&self, job_id: JobId, task: &Task) -> Result<Task> {
        self.enter(RemoteOp::AddTask).await?;
        self.inner.add_task(job_id, task).await
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<()> {
        self.enter(RemoteOp::UpdateTask).await?;
        self.inner.update_task(task_id, patch).await
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        self.enter(RemoteOp::DeleteTask).await?;
        self.inner.delete_task(task_id).await
    }

    async fn start_task_execution(
        &self,
        task_id: TaskId,
        actor: &Actor,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        self.enter(RemoteOp::StartTaskExecution).await?;
        self.inner
            .start_task_execution(task_id, actor, started_at)
            .await
    }

    async fn stop_task_execution(&self, record: &ExecutionRecord, total_seconds: u64) -> Result<()> {
        self.enter(RemoteOp::StopTaskExecution).await?;
        self.inner.stop_task_execution(record, total_seconds).await
    }

    async fn task_executions(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>> {
        self.enter(RemoteOp::TaskExecutions).await?;
        self.inner.task_executions(job_id).await
    }

    async fn add_reminder(&self, job_id: JobId, reminder: &Reminder) -> Result<Reminder> {
        self.enter(RemoteOp::AddReminder).await?;
        self.inner.add_reminder(job_id, reminder).await
    }

    async fn update_reminder(&self, reminder_id: ReminderId, patch: &ReminderPatch) -> Result<()> {
        self.enter(RemoteOp::UpdateReminder).await?;
        self.inner.update_reminder(reminder_id, patch).await
    }

    async fn set_reminder_status(&self, reminder_id: ReminderId, status: ReminderStatus) -> Result<()> {
        self.enter(RemoteOp::SetReminderStatus).await?;
        self.inner.set_reminder_status(reminder_id, status).await
    }

    async fn delete_reminder(&self, reminder_id: ReminderId) -> Result<()> {
        self.enter(RemoteOp::DeleteReminder).await?;
        self.inner.delete_reminder(reminder_id).await
    }
}
