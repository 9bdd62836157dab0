//! Reminders attached to a job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Job;
use crate::error::{EntityKind, Error, Result};
use crate::ids::{JobId, ReminderId};

/// Whether a reminder still holds the job open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Still pending
    #[default]
    Active,
    /// Dealt with
    Done,
}

impl ReminderStatus {
    /// The opposite status, for toggle buttons.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Done,
            Self::Done => Self::Active,
        }
    }
}

/// A follow-up item on a job (call the customer, wait for a part).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique identifier
    pub id: ReminderId,
    /// Owning job
    pub job_id: JobId,
    /// Short description
    pub title: String,
    /// Longer text
    #[serde(default)]
    pub message: Option<String>,
    /// When it is due
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Current status
    #[serde(default)]
    pub status: ReminderStatus,
}

impl Reminder {
    /// Creates an active reminder.
    pub fn new(job_id: JobId, title: impl Into<String>) -> Self {
        Self {
            id: ReminderId::new(),
            job_id,
            title: title.into(),
            message: None,
            due_at: None,
            status: ReminderStatus::Active,
        }
    }
}

/// Fields accepted when adding a reminder. New reminders are always active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    /// Short description
    pub title: String,
    /// Longer text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When it is due
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

impl NewReminder {
    /// Reminder fields with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Materializes an active reminder for `job_id`.
    pub fn into_reminder(self, job_id: JobId) -> Reminder {
        let mut reminder = Reminder::new(job_id, self.title);
        reminder.message = self.message;
        reminder.due_at = self.due_at;
        reminder
    }
}

/// Partial update of a reminder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// New due date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// New status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReminderStatus>,
}

impl ReminderPatch {
    /// Applies the set fields.
    pub fn apply(&self, reminder: &mut Reminder) {
        if let Some(title) = &self.title {
            reminder.title.clone_from(title);
        }
        if let Some(message) = &self.message {
            reminder.message = Some(message.clone());
        }
        if let Some(due_at) = self.due_at {
            reminder.due_at = Some(due_at);
        }
        if let Some(status) = self.status {
            reminder.status = status;
        }
    }
}

impl Job {
    /// Adds a reminder and re-derives the status.
    ///
    /// # Errors
    /// Returns `InvalidState` if the reminder belongs to another job.
    pub fn add_reminder(&mut self, reminder: Reminder, at: DateTime<Utc>) -> Result<()> {
        if reminder.job_id != self.id {
            return Err(Error::InvalidState(format!(
                "reminder {} belongs to job {}, not {}",
                reminder.id, reminder.job_id, self.id
            )));
        }
        self.reminders.push(reminder);
        self.refresh_status(at);
        Ok(())
    }

    /// Updates a reminder and re-derives the status.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such reminder.
    pub fn update_reminder(
        &mut self,
        reminder_id: ReminderId,
        patch: &ReminderPatch,
        at: DateTime<Utc>,
    ) -> Result<()> {
        patch.apply(self.reminder_mut(reminder_id)?);
        self.refresh_status(at);
        Ok(())
    }

    /// Sets a reminder's status and re-derives the job status.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such reminder.
    pub fn set_reminder_status(
        &mut self,
        reminder_id: ReminderId,
        status: ReminderStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.reminder_mut(reminder_id)?.status = status;
        self.refresh_status(at);
        Ok(())
    }

    /// Removes a reminder and re-derives the status.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such reminder.
    pub fn remove_reminder(&mut self, reminder_id: ReminderId, at: DateTime<Utc>) -> Result<Reminder> {
        let index = self
            .reminders
            .iter()
            .position(|reminder| reminder.id == reminder_id)
            .ok_or_else(|| Error::not_found(EntityKind::Reminder, reminder_id))?;
        let removed = self.reminders.remove(index);
        self.refresh_status(at);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use chrono::TimeZone as _;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_active_reminder_on_pending_job_sets_reminder_status() {
        let mut job = Job::new("ABC", at());
        let reminder = NewReminder::titled("Part arrives Monday").into_reminder(job.id);
        job.add_reminder(reminder, at()).unwrap();

        assert_eq!(job.status, JobStatus::Reminder);
        assert_eq!(job.status_history.len(), 1);
    }

    #[test]
    fn test_toggle_and_remove_reminder() {
        let mut job = Job::new("ABC", at());
        let reminder = NewReminder::titled("Call").into_reminder(job.id);
        let reminder_id = reminder.id;
        job.add_reminder(reminder, at()).unwrap();

        job.set_reminder_status(reminder_id, ReminderStatus::Active.toggled(), at())
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        job.set_reminder_status(reminder_id, ReminderStatus::Active, at())
            .unwrap();
        assert_eq!(job.status, JobStatus::Reminder);

        job.remove_reminder(reminder_id, at()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.reminders.is_empty());
    }

    #[test]
    fn test_update_reminder_fields() {
        let mut job = Job::new("ABC", at());
        let reminder = NewReminder::titled("Call").into_reminder(job.id);
        let reminder_id = reminder.id;
        job.add_reminder(reminder, at()).unwrap();

        let patch = ReminderPatch {
            title: Some("Call back".to_owned()),
            message: Some("About the quote".to_owned()),
            ..ReminderPatch::default()
        };
        job.update_reminder(reminder_id, &patch, at()).unwrap();

        let updated = job.reminder(reminder_id).unwrap();
        assert_eq!(updated.title, "Call back");
        assert_eq!(updated.message.as_deref(), Some("About the quote"));
        assert_eq!(updated.status, ReminderStatus::Active);
    }

    #[test]
    fn test_unknown_reminder_is_not_found() {
        let mut job = Job::new("ABC", at());
        let error = job
            .set_reminder_status(ReminderId::new(), ReminderStatus::Done, at())
            .unwrap_err();
        assert!(matches!(
            error,
            Error::NotFound {
                kind: EntityKind::Reminder,
                ..
            }
        ));
    }
}
