//! Reminder mutations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopfloor_core::{
    EntityKind, Error, Job, JobId, Reminder, ReminderId, ReminderPatch, ReminderStatus, Result,
};

use super::Mutation;
use crate::remote::RemoteStore;

/// Adds a reminder with a client-generated id.
#[derive(Debug, Clone)]
pub struct AddReminder {
    /// Owning job
    pub job_id: JobId,
    /// Reminder to insert
    pub reminder: Reminder,
    /// When it was added
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for AddReminder {
    type Plan = ();
    type Output = Reminder;

    fn name(&self) -> &'static str {
        "add_reminder"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.add_reminder(self.reminder.clone(), self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.add_reminder(self.job_id, &self.reminder).await
    }
}

/// Edits reminder fields.
#[derive(Debug, Clone)]
pub struct UpdateReminder {
    /// Owning job
    pub job_id: JobId,
    /// Reminder to edit
    pub reminder_id: ReminderId,
    /// Fields to change
    pub patch: ReminderPatch,
    /// When it was edited
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for UpdateReminder {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "update_reminder"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.update_reminder(self.reminder_id, &self.patch, self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.update_reminder(self.reminder_id, &self.patch).await
    }
}

/// Sets a reminder active or done. Setting the current status is a no-op.
#[derive(Debug, Clone)]
pub struct SetReminderStatus {
    /// Owning job
    pub job_id: JobId,
    /// Reminder to change
    pub reminder_id: ReminderId,
    /// Target status
    pub status: ReminderStatus,
    /// When it changed
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for SetReminderStatus {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "set_reminder_status"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        let current = job
            .reminder(self.reminder_id)
            .ok_or_else(|| Error::not_found(EntityKind::Reminder, self.reminder_id))?;
        if current.status == self.status {
            return Ok(None);
        }
        job.set_reminder_status(self.reminder_id, self.status, self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote
            .set_reminder_status(self.reminder_id, self.status)
            .await
    }
}

/// Deletes a reminder.
#[derive(Debug, Clone)]
pub struct DeleteReminder {
    /// Owning job
    pub job_id: JobId,
    /// Reminder to delete
    pub reminder_id: ReminderId,
    /// When it was deleted
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for DeleteReminder {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_reminder"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        job.remove_reminder(self.reminder_id, self.at)?;
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.delete_reminder(self.reminder_id).await
    }
}
