//! Task types and task-level edits on a job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::ExecutionRecord;
use super::model::{Actor, Job};
use crate::error::{EntityKind, Error, Result};
use crate::ids::{JobId, TaskId};

/// Task lifecycle state.
///
/// Wire names follow the stored representation (`todo`, `in_progress`, `done`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Not running, not finished
    #[default]
    #[serde(rename = "todo")]
    Pending,
    /// Clock is running
    #[serde(rename = "in_progress")]
    Running,
    /// Finished
    #[serde(rename = "done")]
    Done,
}

/// A unit of work inside a job, with its own execution clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    /// Owning job
    pub job_id: JobId,
    /// What has to be done
    pub title: String,
    /// Lifecycle state
    #[serde(default)]
    pub state: TaskState,
    /// Position in the job's task list
    #[serde(default)]
    pub order: u32,
    /// Free-form note from the mechanic
    #[serde(default)]
    pub observation: Option<String>,
    /// Accumulated seconds of finished sessions
    #[serde(default)]
    pub time_spent_seconds: u64,
    /// Start of the running session; present iff the state is `Running`
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Who last started the clock
    #[serde(default)]
    pub last_executor: Option<Actor>,
}

impl Task {
    /// Creates a pending task with no recorded time.
    pub fn new(job_id: JobId, title: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            job_id,
            title: title.into(),
            state: TaskState::Pending,
            order: 0,
            observation: None,
            time_spent_seconds: 0,
            started_at: None,
            last_executor: None,
        }
    }

    /// Whether the clock is running.
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }

    /// Whether the task is finished.
    pub fn is_done(&self) -> bool {
        self.state == TaskState::Done
    }
}

/// Fields accepted when adding a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// What has to be done
    pub title: String,
    /// Optional note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// Explicit position; appended at the end when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl NewTask {
    /// Task fields with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Materializes the task for `job`, appended after the existing ones unless an order is given.
    pub fn into_task(self, job: &Job) -> Task {
        let mut task = Task::new(job.id, self.title);
        task.observation = self.observation;
        task.order = self.order.unwrap_or(job.tasks.len() as u32);
        task
    }
}

/// Partial update of a task's fields.
///
/// Local edits only carry the descriptive fields. State and timing move
/// through start, stop, complete and reopen so sessions are never lost;
/// `state` and `time_spent_seconds` exist for the remote writes those
/// transitions issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// New position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// New state, written remotely by complete and reopen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    /// Accumulated time, written remotely after a completion stopped the clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u64>,
}

impl TaskPatch {
    /// Whether the patch sets state or accumulated time.
    pub const fn touches_execution(&self) -> bool {
        self.state.is_some() || self.time_spent_seconds.is_some()
    }

    /// Applies the set fields. A patched state other than `Running` clears the session start.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(observation) = &self.observation {
            task.observation = Some(observation.clone());
        }
        if let Some(order) = self.order {
            task.order = order;
        }
        if let Some(seconds) = self.time_spent_seconds {
            task.time_spent_seconds = seconds;
        }
        if let Some(state) = self.state {
            task.state = state;
            if state != TaskState::Running {
                task.started_at = None;
            }
        }
    }
}

impl Job {
    /// Adds a task and re-derives the status.
    ///
    /// # Errors
    /// Returns `InvalidState` if the task belongs to another job or is added already running.
    pub fn add_task(&mut self, task: Task, at: DateTime<Utc>) -> Result<()> {
        if task.job_id != self.id {
            return Err(Error::InvalidState(format!(
                "task {} belongs to job {}, not {}",
                task.id, task.job_id, self.id
            )));
        }
        if task.is_running() {
            return Err(Error::InvalidState(
                "tasks cannot be added with a running clock".to_owned(),
            ));
        }
        self.tasks.push(task);
        self.refresh_status(at);
        Ok(())
    }

    /// Updates a task's descriptive fields and re-derives the status.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task and `InvalidState` for a patch
    /// that sets the state or the accumulated time.
    pub fn update_task(&mut self, task_id: TaskId, patch: &TaskPatch, at: DateTime<Utc>) -> Result<()> {
        if patch.touches_execution() {
            return Err(Error::InvalidState(
                "task state and time only change through start, stop, complete and reopen".to_owned(),
            ));
        }
        patch.apply(self.task_mut(task_id)?);
        self.refresh_status(at);
        Ok(())
    }

    /// Removes a task and re-derives the status. A running session is discarded.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such task.
    pub fn remove_task(&mut self, task_id: TaskId, at: DateTime<Utc>) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))?;
        let removed = self.tasks.remove(index);
        self.refresh_status(at);
        Ok(removed)
    }

    /// Marks a task done, stopping its clock first if it is running.
    ///
    /// Returns the execution record of the stopped session, if any.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such task.
    pub fn complete_task(
        &mut self,
        task_id: TaskId,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Option<ExecutionRecord>> {
        let task = self.task_mut(task_id)?;
        let record = task.end_session(actor, at);
        task.state = TaskState::Done;
        self.refresh_status(at);
        Ok(record)
    }

    /// Moves a finished task back to pending.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such task.
    pub fn reopen_task(&mut self, task_id: TaskId, at: DateTime<Utc>) -> Result<()> {
        let task = self.task_mut(task_id)?;
        if task.is_done() {
            task.state = TaskState::Pending;
        }
        self.refresh_status(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use chrono::{Duration, TimeZone as _};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_task_state_wire_names() {
        assert_eq!(serde_json::to_string(&TaskState::Pending).unwrap(), "\"todo\"");
        assert_eq!(serde_json::to_string(&TaskState::Running).unwrap(), "\"in_progress\"");
        let parsed: TaskState = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(parsed, TaskState::Done);
    }

    #[test]
    fn test_new_task_is_appended_in_order() {
        let mut job = Job::new("ABC", at());
        let first = NewTask::titled("Oil").into_task(&job);
        job.add_task(first, at()).unwrap();
        let second = NewTask::titled("Filter").into_task(&job);
        assert_eq!(second.order, 1);
        job.add_task(second, at()).unwrap();
        assert_eq!(job.tasks.len(), 2);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_add_task_from_other_job_is_rejected() {
        let mut job = Job::new("ABC", at());
        let foreign = Task::new(JobId::new(), "Oil");
        assert!(matches!(job.add_task(foreign, at()), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_patch_cannot_start_clock() {
        let mut job = Job::new("ABC", at());
        let task = NewTask::titled("Oil").into_task(&job);
        let task_id = task.id;
        job.add_task(task, at()).unwrap();

        let patch = TaskPatch {
            state: Some(TaskState::Running),
            ..TaskPatch::default()
        };
        assert!(matches!(
            job.update_task(task_id, &patch, at()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_patch_cannot_end_running_session() {
        let mut job = Job::new("ABC", at());
        let task = NewTask::titled("Oil").into_task(&job);
        let task_id = task.id;
        job.add_task(task, at()).unwrap();
        let actor = Actor::new("u1", "Ana");
        job.start_task(task_id, &actor, at()).unwrap();
        let later = at() + Duration::seconds(600);

        let done = TaskPatch {
            state: Some(TaskState::Done),
            ..TaskPatch::default()
        };
        assert!(matches!(
            job.update_task(task_id, &done, later),
            Err(Error::InvalidState(_))
        ));
        let reset = TaskPatch {
            time_spent_seconds: Some(0),
            title: Some("Oil and filter".to_owned()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            job.update_task(task_id, &reset, later),
            Err(Error::InvalidState(_))
        ));

        let current = job.task(task_id).unwrap();
        assert!(current.is_running());
        assert_eq!(current.title, "Oil");
        assert_eq!(current.live_seconds(later), 600);
        assert_eq!(job.status, JobStatus::InProgress);
    }

    #[test]
    fn test_complete_and_reopen_drive_status() {
        let mut job = Job::new("ABC", at());
        let task = NewTask::titled("Oil").into_task(&job);
        let task_id = task.id;
        job.add_task(task, at()).unwrap();

        let actor = Actor::new("u1", "Ana");
        assert!(job.complete_task(task_id, &actor, at()).unwrap().is_none());
        assert_eq!(job.status, JobStatus::Ready);

        job.reopen_task(task_id, at()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.status_history.len(), 2);
    }

    #[test]
    fn test_remove_last_open_task_makes_job_ready() {
        let mut job = Job::new("ABC", at());
        let done = NewTask::titled("Oil").into_task(&job);
        let done_id = done.id;
        job.add_task(done, at()).unwrap();
        let open = NewTask::titled("Filter").into_task(&job);
        let open_id = open.id;
        job.add_task(open, at()).unwrap();

        let actor = Actor::new("u1", "Ana");
        job.complete_task(done_id, &actor, at()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let removed = job.remove_task(open_id, at()).unwrap();
        assert_eq!(removed.title, "Filter");
        assert_eq!(job.status, JobStatus::Ready);
    }
}
