//! Service job and its editable fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::reminder::{Reminder, ReminderStatus};
use super::status::{JobStatus, StatusEntry};
use super::task::{Task, TaskState};
use crate::error::{EntityKind, Error, Result};
use crate::ids::{JobId, ReminderId, TaskId};

/// Person performing an action (mechanic, front-desk user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Account identifier
    pub id: String,
    /// Display name
    pub name: String,
}

impl Actor {
    /// Creates an actor from an id and display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Scheduling priority of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Can wait
    Low,
    /// Normal
    #[default]
    Medium,
    /// Customer is waiting
    High,
}

/// A service job (work order) for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier
    pub id: JobId,
    /// Short vehicle description shown on cards (plate, model)
    #[serde(default)]
    pub vehicle_label: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Append-only log of status changes
    #[serde(default)]
    pub status_history: Vec<StatusEntry>,
    /// Work items
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Follow-ups that keep the job open
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    /// Scheduling priority
    #[serde(default)]
    pub priority: Priority,
    /// When the vehicle entered the workshop
    pub entry_at: DateTime<Utc>,
    /// Promised delivery date
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Hidden from the default dashboard lists
    #[serde(default)]
    pub archived: bool,
}

impl Job {
    /// Creates an empty pending job.
    pub fn new(vehicle_label: impl Into<String>, entry_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            vehicle_label: vehicle_label.into(),
            status: JobStatus::Pending,
            status_history: Vec::new(),
            tasks: Vec::new(),
            reminders: Vec::new(),
            priority: Priority::Medium,
            entry_at,
            estimated_delivery: None,
            archived: false,
        }
    }

    /// Looks up a task by id.
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Looks up a task by id, failing with `NotFound`.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such task.
    pub fn task_mut(&mut self, task_id: TaskId) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))
    }

    /// Looks up a reminder by id.
    pub fn reminder(&self, reminder_id: ReminderId) -> Option<&Reminder> {
        self.reminders
            .iter()
            .find(|reminder| reminder.id == reminder_id)
    }

    /// Looks up a reminder by id, failing with `NotFound`.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such reminder.
    pub fn reminder_mut(&mut self, reminder_id: ReminderId) -> Result<&mut Reminder> {
        self.reminders
            .iter_mut()
            .find(|reminder| reminder.id == reminder_id)
            .ok_or_else(|| Error::not_found(EntityKind::Reminder, reminder_id))
    }

    /// The task whose clock is currently running, if any.
    pub fn running_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.state == TaskState::Running)
    }

    /// Number of tasks in the running state. Always 0 or 1 for consistent data.
    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.state == TaskState::Running)
            .count()
    }

    /// Whether any reminder is still active.
    pub fn has_active_reminders(&self) -> bool {
        self.reminders
            .iter()
            .any(|reminder| reminder.status == ReminderStatus::Active)
    }

    /// Total time worked on the job, including the running session.
    pub fn total_time_spent(&self, now: DateTime<Utc>) -> u64 {
        self.tasks.iter().map(|task| task.live_seconds(now)).sum()
    }

    /// Applies every field of a patch verbatim, including status and history
    /// entries. No derivation runs here.
    pub fn apply_patch(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.status_history
            .extend(patch.append_history.iter().cloned());
        if let Some(label) = &patch.vehicle_label {
            self.vehicle_label.clone_from(label);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(delivery) = patch.estimated_delivery {
            self.estimated_delivery = Some(delivery);
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
    }
}

/// Partial update of a job, as sent to the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    /// New vehicle label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_label: Option<String>,
    /// New priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New promised delivery date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Archive or unarchive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    /// New status; only set together with the entries that justify it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Status history entries to append
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append_history: Vec<StatusEntry>,
}

impl JobPatch {
    /// Patch that records a status change and its history entries.
    pub fn status_change(status: JobStatus, entries: Vec<StatusEntry>) -> Self {
        Self {
            status: Some(status),
            append_history: entries,
            ..Self::default()
        }
    }

    /// Whether the patch carries no change at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether the patch touches the status.
    pub fn changes_status(&self) -> bool {
        self.status.is_some() || !self.append_history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone as _};

    fn entry_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_job_is_pending_and_empty() {
        let job = Job::new("ABC-1234 Gol", entry_time());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.tasks.is_empty());
        assert!(job.status_history.is_empty());
        assert!(job.running_task().is_none());
        assert!(!job.has_active_reminders());
    }

    #[test]
    fn test_apply_patch_only_touches_set_fields() {
        let mut job = Job::new("ABC-1234", entry_time());
        let delivery = entry_time() + Duration::days(2);
        job.apply_patch(&JobPatch {
            priority: Some(Priority::High),
            estimated_delivery: Some(delivery),
            ..JobPatch::default()
        });

        assert_eq!(job.priority, Priority::High);
        assert_eq!(job.estimated_delivery, Some(delivery));
        assert_eq!(job.vehicle_label, "ABC-1234");
        assert!(!job.archived);
    }

    #[test]
    fn test_patch_emptiness() {
        assert!(JobPatch::default().is_empty());
        let patch = JobPatch::status_change(JobStatus::Ready, Vec::new());
        assert!(!patch.is_empty());
        assert!(patch.changes_status());
    }

    #[test]
    fn test_missing_task_is_not_found() {
        let mut job = Job::new("X", entry_time());
        let error = job.task_mut(TaskId::new()).unwrap_err();
        assert!(matches!(
            error,
            Error::NotFound {
                kind: EntityKind::Task,
                ..
            }
        ));
    }
}
