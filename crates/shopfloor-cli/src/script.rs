//! Action scripts replayed by `shopfloor run`

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shopfloor_core::{
    Actor, Clock, Job, JobFilter, JobId, JobPatch, JobStatus, ManualClock, NewReminder, NewTask,
    ReconcileMode, ReminderId, ReminderPatch, ReminderStatus, Result as CoreResult, SyncConfig,
    TaskId, TaskPatch,
};
use shopfloor_sync::{RemoteStore, Workshop};

/// A recorded sequence of user actions.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Clock value before the first step; the current time when absent
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Who performs every step
    pub actor: Actor,
    /// Actions in replay order
    pub steps: Vec<Step>,
}

impl Script {
    /// Reads a script from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid script {}", path.display()))
    }
}

/// One user action. `advance` moves the script clock instead of touching jobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Let time pass
    Advance {
        /// Seconds to move the clock forward
        seconds: u32,
    },
    /// Start a task's clock
    StartTask {
        /// Target task
        task: TaskId,
    },
    /// Stop a task's clock
    StopTask {
        /// Target task
        task: TaskId,
    },
    /// Start or stop, whichever applies
    ToggleTimer {
        /// Target task
        task: TaskId,
    },
    /// Append a task to a job
    AddTask {
        /// Owning job
        job: JobId,
        /// Task fields
        #[serde(flatten)]
        fields: NewTask,
    },
    /// Edit task fields
    UpdateTask {
        /// Target task
        task: TaskId,
        /// Fields to change
        patch: TaskPatch,
    },
    /// Mark a task done
    CompleteTask {
        /// Target task
        task: TaskId,
    },
    /// Move a done task back to pending
    ReopenTask {
        /// Target task
        task: TaskId,
    },
    /// Remove a task
    DeleteTask {
        /// Target task
        task: TaskId,
    },
    /// Attach a reminder to a job
    AddReminder {
        /// Owning job
        job: JobId,
        /// Reminder fields
        #[serde(flatten)]
        fields: NewReminder,
    },
    /// Edit reminder fields
    UpdateReminder {
        /// Target reminder
        reminder: ReminderId,
        /// Fields to change
        patch: ReminderPatch,
    },
    /// Set a reminder's status
    SetReminderStatus {
        /// Target reminder
        reminder: ReminderId,
        /// New status
        status: ReminderStatus,
    },
    /// Flip a reminder between active and done
    ToggleReminder {
        /// Target reminder
        reminder: ReminderId,
    },
    /// Remove a reminder
    DeleteReminder {
        /// Target reminder
        reminder: ReminderId,
    },
    /// Edit job fields other than the status
    UpdateJob {
        /// Target job
        job: JobId,
        /// Fields to change
        patch: JobPatch,
    },
    /// Hand the vehicle back
    Deliver {
        /// Target job
        job: JobId,
    },
    /// Force a status
    OverrideStatus {
        /// Target job
        job: JobId,
        /// Requested status
        status: JobStatus,
    },
}

impl Step {
    /// Action name as written in scripts.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::StartTask { .. } => "start_task",
            Self::StopTask { .. } => "stop_task",
            Self::ToggleTimer { .. } => "toggle_timer",
            Self::AddTask { .. } => "add_task",
            Self::UpdateTask { .. } => "update_task",
            Self::CompleteTask { .. } => "complete_task",
            Self::ReopenTask { .. } => "reopen_task",
            Self::DeleteTask { .. } => "delete_task",
            Self::AddReminder { .. } => "add_reminder",
            Self::UpdateReminder { .. } => "update_reminder",
            Self::SetReminderStatus { .. } => "set_reminder_status",
            Self::ToggleReminder { .. } => "toggle_reminder",
            Self::DeleteReminder { .. } => "delete_reminder",
            Self::UpdateJob { .. } => "update_job",
            Self::Deliver { .. } => "deliver",
            Self::OverrideStatus { .. } => "override_status",
        }
    }
}

/// Every job, archived ones included.
const EVERYTHING: JobFilter = JobFilter {
    status: None,
    include_archived: true,
};

/// Drives a workshop with a clock that only moves on `advance` steps.
pub struct Replayer {
    workshop: Workshop,
    clock: Arc<ManualClock>,
    actor: Actor,
}

impl Replayer {
    /// Builds a replayer over `remote`. Reconciliation always runs inline so
    /// each step sees the settled state of the previous one.
    pub fn new(remote: Arc<dyn RemoteStore>, start_at: DateTime<Utc>, actor: Actor, refresh_lists: bool) -> Self {
        let clock = Arc::new(ManualClock::new(start_at));
        let config = SyncConfig {
            reconcile: ReconcileMode::Inline,
            refresh_lists,
        };
        Self {
            workshop: Workshop::new(remote, Arc::clone(&clock) as Arc<dyn Clock>, config),
            clock,
            actor,
        }
    }

    /// Loads every job into the cache.
    ///
    /// # Errors
    /// Returns the remote error if the list cannot be fetched.
    pub async fn load(&self) -> CoreResult<usize> {
        let jobs = self.workshop.dispatcher().load_list(EVERYTHING).await?;
        Ok(jobs.len())
    }

    /// Current script time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Applies one step.
    ///
    /// # Errors
    /// Returns whatever the underlying action returns.
    pub async fn run_step(&self, step: &Step) -> CoreResult<()> {
        let actions = self.workshop.actions();
        let execution = self.workshop.execution();
        let actor = &self.actor;

        match step {
            Step::Advance { seconds } => self.clock.advance_secs(i64::from(*seconds)),
            Step::StartTask { task } => {
                execution.start(*task, actor).await?;
            }
            Step::StopTask { task } => {
                execution.stop(*task, actor).await?;
            }
            Step::ToggleTimer { task } => {
                execution.toggle(*task, actor).await?;
            }
            Step::AddTask { job, fields } => {
                let added = actions.add_task(*job, fields.clone()).await?;
                tracing::info!(job = %job, task = %added.id, "Added task '{}'", added.title);
            }
            Step::UpdateTask { task, patch } => actions.update_task(*task, patch.clone()).await?,
            Step::CompleteTask { task } => {
                actions.complete_task(*task, actor).await?;
            }
            Step::ReopenTask { task } => actions.reopen_task(*task).await?,
            Step::DeleteTask { task } => actions.delete_task(*task).await?,
            Step::AddReminder { job, fields } => {
                let added = actions.add_reminder(*job, fields.clone()).await?;
                tracing::info!(job = %job, reminder = %added.id, "Added reminder '{}'", added.title);
            }
            Step::UpdateReminder { reminder, patch } => {
                actions.update_reminder(*reminder, patch.clone()).await?;
            }
            Step::SetReminderStatus { reminder, status } => {
                actions.set_reminder_status(*reminder, *status).await?;
            }
            Step::ToggleReminder { reminder } => {
                actions.toggle_reminder(*reminder).await?;
            }
            Step::DeleteReminder { reminder } => actions.delete_reminder(*reminder).await?,
            Step::UpdateJob { job, patch } => actions.update_job(*job, patch.clone()).await?,
            Step::Deliver { job } => {
                let outcome = actions.deliver(*job, actor).await?;
                if outcome.entry.is_none() {
                    tracing::info!(job = %job, "Job was already delivered");
                }
            }
            Step::OverrideStatus { job, status } => {
                actions.override_status(*job, *status, actor).await?;
            }
        }
        Ok(())
    }

    /// Every job as the backend holds it after the replay, refreshed into the cache.
    ///
    /// # Errors
    /// Returns the remote error if the list cannot be fetched.
    pub async fn snapshot(&self) -> CoreResult<Vec<Job>> {
        self.workshop.dispatcher().settled().await;
        self.workshop.dispatcher().load_list(EVERYTHING).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone as _};
    use shopfloor_core::{Error, TaskState, format_duration};
    use shopfloor_sync::InMemoryRemote;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
    }

    fn seeded() -> (Arc<dyn RemoteStore>, JobId, TaskId) {
        let mut job = Job::new("ABC-1234", start());
        let task = NewTask::titled("Brake pads").into_task(&job);
        let task_id = task.id;
        job.add_task(task, start()).unwrap();
        let job_id = job.id;
        (Arc::new(InMemoryRemote::with_jobs([job])), job_id, task_id)
    }

    #[test]
    fn test_parse_steps() {
        let json = r#"{
            "start_at": "2024-06-03T08:00:00Z",
            "actor": {"id": "u-7", "name": "Carlos"},
            "steps": [
                {"action": "advance", "seconds": 30},
                {"action": "add_task", "job": "7d1c43a4-2b5e-4b8e-9a43-0c6a9e1f5b10", "title": "Wipers"},
                {"action": "set_reminder_status", "reminder": "0f8e2d2c-61aa-4a8f-8d3f-3a4cbb9e0d01", "status": "done"},
                {"action": "override_status", "job": "7d1c43a4-2b5e-4b8e-9a43-0c6a9e1f5b10", "status": "in_progress"}
            ]
        }"#;
        let script: Script = serde_json::from_str(json).unwrap();

        assert_eq!(script.start_at, Some(start()));
        let names: Vec<_> = script.steps.iter().map(Step::name).collect();
        assert_eq!(
            names,
            ["advance", "add_task", "set_reminder_status", "override_status"]
        );
        assert!(matches!(
            &script.steps[1],
            Step::AddTask { fields, .. } if fields.title == "Wipers" && fields.order.is_none()
        ));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let json = r#"{"actor": {"id": "u-7", "name": "Carlos"}, "steps": [{"action": "explode"}]}"#;
        assert!(serde_json::from_str::<Script>(json).is_err());
    }

    #[tokio::test]
    async fn test_replay_accumulates_script_time() {
        let (remote, job_id, task_id) = seeded();
        let replayer = Replayer::new(remote, start(), Actor::new("u-7", "Carlos"), true);
        assert_eq!(replayer.load().await.unwrap(), 1);

        for step in [
            Step::StartTask { task: task_id },
            Step::Advance { seconds: 95 },
            Step::CompleteTask { task: task_id },
            Step::Deliver { job: job_id },
        ] {
            replayer.run_step(&step).await.unwrap();
        }

        let jobs = replayer.snapshot().await.unwrap();
        let task = jobs[0].task(task_id).unwrap();
        assert_eq!(task.state, TaskState::Done);
        assert_eq!(format_duration(task.time_spent_seconds), "01:35");
        assert_eq!(jobs[0].status, JobStatus::Delivered);
        assert_eq!(replayer.now(), start() + Duration::seconds(95));
    }

    #[tokio::test]
    async fn test_failed_step_reports_the_action_error() {
        let (remote, _, task_id) = seeded();
        let replayer = Replayer::new(remote, start(), Actor::new("u-7", "Carlos"), true);
        replayer.load().await.unwrap();

        replayer
            .run_step(&Step::CompleteTask { task: task_id })
            .await
            .unwrap();
        let error = replayer
            .run_step(&Step::StartTask { task: task_id })
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidState(_)));
    }
}
