//! Job lifecycle status and the derivation rule

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::model::{Actor, Job};
use super::reminder::{Reminder, ReminderStatus};
use super::task::{Task, TaskState};
use crate::ids::StatusEntryId;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Nothing running, not finished
    Pending,
    /// A task clock is running
    InProgress,
    /// Waiting on an active reminder
    Reminder,
    /// Every task is done
    Ready,
    /// Handed back to the customer (terminal)
    Delivered,
}

impl JobStatus {
    /// Stable lowercase name, used in cache keys and query strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Reminder => "reminder",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
        }
    }

    /// Whether derivation can never leave this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Reminder => "Reminder",
            Self::Ready => "Ready",
            Self::Delivered => "Delivered",
        };
        f.write_str(label)
    }
}

/// What caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSource {
    /// Recomputed from tasks and reminders
    SystemRule,
    /// Explicit hand-over to the customer
    ManualDelivery,
    /// Explicit status change by a user
    ManualOverride,
}

/// One line of a job's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Unique identifier
    pub id: StatusEntryId,
    /// Status entered
    pub status: JobStatus,
    /// When it was entered
    pub timestamp: DateTime<Utc>,
    /// Who caused it; `None` for system-rule entries
    #[serde(default)]
    pub actor: Option<Actor>,
    /// Why it changed
    pub source: StatusSource,
}

/// Derives a job's status from its current status, tasks and reminders.
///
/// First match wins: delivered stays delivered, any running task means
/// in progress, an active reminder means reminder, all tasks done means ready,
/// otherwise pending. Never returns `Delivered` unless `current` already is.
pub fn derive_status(current: JobStatus, tasks: &[Task], reminders: &[Reminder]) -> JobStatus {
    if current.is_terminal() {
        return current;
    }

    if tasks.iter().any(|task| task.state == TaskState::Running) {
        return JobStatus::InProgress;
    }

    if reminders
        .iter()
        .any(|reminder| reminder.status == ReminderStatus::Active)
    {
        return JobStatus::Reminder;
    }

    if !tasks.is_empty() && tasks.iter().all(|task| task.state == TaskState::Done) {
        return JobStatus::Ready;
    }

    JobStatus::Pending
}

impl Job {
    /// Status the derivation rule assigns to the job right now.
    pub fn derived_status(&self) -> JobStatus {
        derive_status(self.status, &self.tasks, &self.reminders)
    }

    /// Moves the job to `status`, appending a history entry only if the value changes.
    pub fn transition_to(
        &mut self,
        status: JobStatus,
        at: DateTime<Utc>,
        source: StatusSource,
        actor: Option<&Actor>,
    ) -> Option<StatusEntry> {
        if status == self.status {
            return None;
        }

        let entry = StatusEntry {
            id: StatusEntryId::new(),
            status,
            timestamp: at,
            actor: actor.cloned(),
            source,
        };
        tracing::info!(
            job = %self.id,
            from = %self.status,
            to = %status,
            source = ?source,
            "job status changed"
        );
        self.status = status;
        self.status_history.push(entry.clone());
        Some(entry)
    }

    /// Re-runs the derivation rule and records the result if it changed.
    pub fn refresh_status(&mut self, at: DateTime<Utc>) -> Option<StatusEntry> {
        let derived = self.derived_status();
        self.transition_to(derived, at, StatusSource::SystemRule, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{JobId, ReminderId, TaskId};
    use chrono::TimeZone as _;

    fn task(state: TaskState) -> Task {
        let mut task = Task::new(JobId::new(), "Brake pads");
        task.id = TaskId::new();
        task.state = state;
        task
    }

    fn reminder(status: ReminderStatus) -> Reminder {
        let mut reminder = Reminder::new(JobId::new(), "Call customer");
        reminder.id = ReminderId::new();
        reminder.status = status;
        reminder
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_delivered_is_sticky() {
        let tasks = vec![task(TaskState::Running)];
        let reminders = vec![reminder(ReminderStatus::Active)];
        assert_eq!(
            derive_status(JobStatus::Delivered, &tasks, &reminders),
            JobStatus::Delivered
        );
    }

    #[test]
    fn test_running_task_beats_active_reminder() {
        let tasks = vec![task(TaskState::Done), task(TaskState::Running)];
        let reminders = vec![reminder(ReminderStatus::Active)];
        assert_eq!(
            derive_status(JobStatus::Pending, &tasks, &reminders),
            JobStatus::InProgress
        );
    }

    #[test]
    fn test_active_reminder_without_running_task() {
        let tasks = vec![task(TaskState::Done)];
        let reminders = vec![reminder(ReminderStatus::Done), reminder(ReminderStatus::Active)];
        assert_eq!(
            derive_status(JobStatus::Ready, &tasks, &reminders),
            JobStatus::Reminder
        );
    }

    #[test]
    fn test_all_done_is_ready() {
        let tasks = vec![task(TaskState::Done), task(TaskState::Done)];
        let reminders = vec![reminder(ReminderStatus::Done)];
        assert_eq!(
            derive_status(JobStatus::InProgress, &tasks, &reminders),
            JobStatus::Ready
        );
    }

    #[test]
    fn test_empty_job_is_pending() {
        assert_eq!(derive_status(JobStatus::Ready, &[], &[]), JobStatus::Pending);
        let tasks = vec![task(TaskState::Done), task(TaskState::Pending)];
        assert_eq!(derive_status(JobStatus::Ready, &tasks, &[]), JobStatus::Pending);
    }

    #[test]
    fn test_never_derives_into_delivered() {
        let states = [TaskState::Pending, TaskState::Running, TaskState::Done];
        for current in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Reminder,
            JobStatus::Ready,
        ] {
            for state in states {
                let tasks = vec![task(state)];
                assert_ne!(derive_status(current, &tasks, &[]), JobStatus::Delivered);
            }
        }
    }

    #[test]
    fn test_refresh_appends_only_on_change() {
        let mut job = Job::new("XYZ", at());
        job.tasks.push(task(TaskState::Done));

        let first = job.refresh_status(at());
        assert_eq!(first.map(|entry| entry.status), Some(JobStatus::Ready));
        assert_eq!(job.status_history.len(), 1);

        let second = job.refresh_status(at());
        assert!(second.is_none());
        assert_eq!(job.status_history.len(), 1);
        assert_eq!(job.status_history[0].source, StatusSource::SystemRule);
        assert!(job.status_history[0].actor.is_none());
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let mut job = Job::new("XYZ", at());
        job.tasks.push(task(TaskState::Running));
        let before = job.clone();
        assert_eq!(job.derived_status(), job.derived_status());
        assert_eq!(job, before);
    }

    #[test]
    fn test_status_source_wire_names() {
        let json = serde_json::to_string(&StatusSource::ManualDelivery).unwrap();
        assert_eq!(json, "\"MANUAL_DELIVERY\"");
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
