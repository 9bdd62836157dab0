//! User actions on jobs, tasks and reminders other than the task clock.

use std::sync::Arc;

use shopfloor_core::{
    Actor, Clock, DeliveryOutcome, EntityKind, Error, ExecutionRecord, JobId, JobPatch, JobStatus,
    NewReminder, NewTask, Reminder, ReminderId, ReminderPatch, ReminderStatus, Result,
    StatusEntry, Task, TaskId, TaskPatch,
};

use crate::dispatcher::Dispatcher;
use crate::mutation::{
    AddReminder, AddTask, CompleteTask, DeleteReminder, DeleteTask, DeliverJob, OverrideStatus,
    ReopenTask, SetReminderStatus, UpdateJob, UpdateReminder, UpdateTask,
};

/// Task, reminder and job actions, each run as one optimistic mutation.
pub struct JobActions {
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

impl JobActions {
    /// Creates the action set.
    pub fn new(dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self { dispatcher, clock }
    }

    fn task_owner(&self, task_id: TaskId) -> Result<JobId> {
        self.dispatcher
            .cache()
            .job_of_task(task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))
    }

    fn reminder_owner(&self, reminder_id: ReminderId) -> Result<JobId> {
        self.dispatcher
            .cache()
            .job_of_reminder(reminder_id)
            .ok_or_else(|| Error::not_found(EntityKind::Reminder, reminder_id))
    }

    /// Adds a task. The cache shows it at once under a client id; the stored
    /// version is returned and replaces it on reconciliation.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job or the remote error after rollback.
    pub async fn add_task(&self, job_id: JobId, fields: NewTask) -> Result<Task> {
        if self.dispatcher.cache().read_job(job_id).is_none() {
            self.dispatcher.load_job(job_id).await?;
        }
        let job = self
            .dispatcher
            .cache()
            .read_job(job_id)
            .ok_or_else(|| Error::not_found(EntityKind::Job, job_id))?;
        let mutation = AddTask {
            job_id,
            task: fields.into_task(&job),
            at: self.clock.now(),
        };
        let task = self.dispatcher.mutate(&mutation).await?;
        Ok(task.unwrap_or(mutation.task))
    }

    /// Edits task fields. The clock state cannot be changed this way.
    ///
    /// # Errors
    /// Returns `InvalidState` for a patch that starts the clock, `NotFound`
    /// for an unknown task, or the remote error after rollback.
    pub async fn update_task(&self, task_id: TaskId, patch: TaskPatch) -> Result<()> {
        let mutation = UpdateTask {
            job_id: self.task_owner(task_id)?,
            task_id,
            patch,
            at: self.clock.now(),
        };
        self.dispatcher.mutate(&mutation).await?;
        Ok(())
    }

    /// Deletes a task.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task or the remote error after rollback.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let mutation = DeleteTask {
            job_id: self.task_owner(task_id)?,
            task_id,
            at: self.clock.now(),
        };
        self.dispatcher.mutate(&mutation).await?;
        Ok(())
    }

    /// Marks a task done. A running clock is stopped first and its session returned.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task or the remote error after rollback.
    pub async fn complete_task(&self, task_id: TaskId, actor: &Actor) -> Result<Option<ExecutionRecord>> {
        let mutation = CompleteTask {
            job_id: self.task_owner(task_id)?,
            task_id,
            actor: actor.clone(),
            at: self.clock.now(),
        };
        Ok(self.dispatcher.mutate(&mutation).await?.flatten())
    }

    /// Moves a done task back to pending.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task or the remote error after rollback.
    pub async fn reopen_task(&self, task_id: TaskId) -> Result<()> {
        let mutation = ReopenTask {
            job_id: self.task_owner(task_id)?,
            task_id,
            at: self.clock.now(),
        };
        self.dispatcher.mutate(&mutation).await?;
        Ok(())
    }

    /// Adds an active reminder.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job or the remote error after rollback.
    pub async fn add_reminder(&self, job_id: JobId, fields: NewReminder) -> Result<Reminder> {
        let mutation = AddReminder {
            job_id,
            reminder: fields.into_reminder(job_id),
            at: self.clock.now(),
        };
        let reminder = self.dispatcher.mutate(&mutation).await?;
        Ok(reminder.unwrap_or(mutation.reminder))
    }

    /// Edits reminder fields.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder or the remote error after rollback.
    pub async fn update_reminder(&self, reminder_id: ReminderId, patch: ReminderPatch) -> Result<()> {
        let mutation = UpdateReminder {
            job_id: self.reminder_owner(reminder_id)?,
            reminder_id,
            patch,
            at: self.clock.now(),
        };
        self.dispatcher.mutate(&mutation).await?;
        Ok(())
    }

    /// Sets a reminder's status.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder or the remote error after rollback.
    pub async fn set_reminder_status(&self, reminder_id: ReminderId, status: ReminderStatus) -> Result<()> {
        let mutation = SetReminderStatus {
            job_id: self.reminder_owner(reminder_id)?,
            reminder_id,
            status,
            at: self.clock.now(),
        };
        self.dispatcher.mutate(&mutation).await?;
        Ok(())
    }

    /// Flips a reminder between active and done, returning the new status.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder or the remote error after rollback.
    pub async fn toggle_reminder(&self, reminder_id: ReminderId) -> Result<ReminderStatus> {
        let job_id = self.reminder_owner(reminder_id)?;
        let current = self
            .dispatcher
            .cache()
            .read_job(job_id)
            .and_then(|job| job.reminder(reminder_id).map(|reminder| reminder.status))
            .ok_or_else(|| Error::not_found(EntityKind::Reminder, reminder_id))?;
        let status = current.toggled();
        self.set_reminder_status(reminder_id, status).await?;
        Ok(status)
    }

    /// Deletes a reminder.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder or the remote error after rollback.
    pub async fn delete_reminder(&self, reminder_id: ReminderId) -> Result<()> {
        let mutation = DeleteReminder {
            job_id: self.reminder_owner(reminder_id)?,
            reminder_id,
            at: self.clock.now(),
        };
        self.dispatcher.mutate(&mutation).await?;
        Ok(())
    }

    /// Edits job fields such as the promised delivery date or priority.
    ///
    /// # Errors
    /// Returns `InvalidState` if the patch carries a status, `NotFound` for
    /// an unknown job, or the remote error after rollback.
    pub async fn update_job(&self, job_id: JobId, patch: JobPatch) -> Result<()> {
        self.dispatcher
            .mutate(&UpdateJob { job_id, patch })
            .await?;
        Ok(())
    }

    /// Delivers the job, stopping a running clock first.
    ///
    /// Delivering a delivered job changes nothing and returns an outcome
    /// without a history entry.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job or the remote error after rollback.
    pub async fn deliver(&self, job_id: JobId, actor: &Actor) -> Result<DeliveryOutcome> {
        let mutation = DeliverJob {
            job_id,
            actor: actor.clone(),
            at: self.clock.now(),
        };
        match self.dispatcher.mutate(&mutation).await? {
            Some(outcome) => {
                tracing::info!("{actor} delivered job {job_id}");
                Ok(outcome)
            }
            None => {
                tracing::info!("Job {job_id} is already delivered");
                Ok(DeliveryOutcome::default())
            }
        }
    }

    /// Sets the status by hand. `Delivered` is routed to [`JobActions::deliver`].
    ///
    /// Returns the history entries appended, possibly none.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job or the remote error after rollback.
    pub async fn override_status(&self, job_id: JobId, status: JobStatus, actor: &Actor) -> Result<Vec<StatusEntry>> {
        if status == JobStatus::Delivered {
            let outcome = self.deliver(job_id, actor).await?;
            return Ok(outcome.entry.into_iter().collect());
        }

        let mutation = OverrideStatus {
            job_id,
            status,
            actor: actor.clone(),
            at: self.clock.now(),
        };
        Ok(self.dispatcher.mutate(&mutation).await?.unwrap_or_default())
    }

    /// Execution history of a job, straight from the remote store.
    ///
    /// # Errors
    /// Returns the remote error.
    pub async fn executions(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>> {
        self.dispatcher.remote().task_executions(job_id).await
    }
}
