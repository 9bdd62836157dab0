//! Task execution clock: sessions, elapsed time and job-level transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Actor, Job};
use super::status::{JobStatus, StatusEntry, StatusSource};
use super::task::{Task, TaskState};
use crate::error::{Error, Result};
use crate::ids::{JobId, TaskId};

/// Immutable record of one finished work session on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Task that was worked on
    pub task_id: TaskId,
    /// Job the task belongs to
    pub job_id: JobId,
    /// Who stopped the clock
    pub actor: Actor,
    /// Session length in seconds
    pub duration_seconds: u64,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session stopped
    pub stopped_at: DateTime<Utc>,
}

impl Task {
    /// Seconds elapsed in the running session, never negative. Zero when not running.
    pub fn session_seconds(&self, now: DateTime<Utc>) -> u64 {
        match (self.state, self.started_at) {
            (TaskState::Running, Some(started_at)) => {
                (now - started_at).num_seconds().max(0) as u64
            }
            _ => 0,
        }
    }

    /// Time to display: accumulated time plus the running session, computed at read time.
    pub fn live_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.time_spent_seconds + self.session_seconds(now)
    }

    /// Starts the clock.
    ///
    /// # Errors
    /// Returns `InvalidState` if the task is already done.
    pub fn begin_session(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<()> {
        if self.is_done() {
            return Err(Error::InvalidState(format!(
                "task '{}' is done and cannot be started",
                self.title
            )));
        }
        self.state = TaskState::Running;
        self.started_at = Some(now);
        self.last_executor = Some(actor.clone());
        Ok(())
    }

    /// Stops the clock, folding the session into the accumulated time.
    ///
    /// Returns `None` without touching anything when the task is not running.
    pub fn end_session(&mut self, actor: &Actor, now: DateTime<Utc>) -> Option<ExecutionRecord> {
        if !self.is_running() {
            return None;
        }

        let duration_seconds = self.session_seconds(now);
        let started_at = self.started_at.unwrap_or(now);
        self.time_spent_seconds += duration_seconds;
        self.started_at = None;
        self.state = TaskState::Pending;

        Some(ExecutionRecord {
            task_id: self.id,
            job_id: self.job_id,
            actor: actor.clone(),
            duration_seconds,
            started_at,
            stopped_at: now,
        })
    }
}

/// Result of starting a task clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOutcome {
    /// Sessions that were closed because another task was running
    pub paused: Vec<ExecutionRecord>,
    /// The target was already running; nothing changed
    pub already_running: bool,
}

/// Result of delivering a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Session closed because a task was still running
    pub stopped: Option<ExecutionRecord>,
    /// History entry for the delivery; `None` if the job was already delivered
    pub entry: Option<StatusEntry>,
}

impl Job {
    /// Starts the clock on `task_id`, pausing whichever task was running.
    ///
    /// Other running tasks are stopped first, so two clocks never run at once.
    /// Starting a task that already runs is a no-op.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task and `InvalidState` for a done one.
    /// Nothing is modified when an error is returned.
    pub fn start_task(&mut self, task_id: TaskId, actor: &Actor, now: DateTime<Utc>) -> Result<StartOutcome> {
        let target = self.task_mut(task_id)?;
        if target.is_done() {
            return Err(Error::InvalidState(format!(
                "task '{}' is done and cannot be started",
                target.title
            )));
        }
        if target.is_running() {
            return Ok(StartOutcome {
                paused: Vec::new(),
                already_running: true,
            });
        }

        let paused: Vec<ExecutionRecord> = self
            .tasks
            .iter_mut()
            .filter(|task| task.id != task_id)
            .filter_map(|task| task.end_session(actor, now))
            .collect();

        self.task_mut(task_id)?.begin_session(actor, now)?;
        self.refresh_status(now);

        Ok(StartOutcome {
            paused,
            already_running: false,
        })
    }

    /// Stops the clock on `task_id`. Returns `None` if it was not running.
    ///
    /// # Errors
    /// Returns `NotFound` if the job has no such task.
    pub fn stop_task(
        &mut self,
        task_id: TaskId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionRecord>> {
        let record = self.task_mut(task_id)?.end_session(actor, now);
        if record.is_some() {
            self.refresh_status(now);
        }
        Ok(record)
    }

    /// Hands the job back to the customer. The only way into `Delivered`.
    ///
    /// A running clock is stopped first. Delivering twice is a reported no-op.
    pub fn deliver(&mut self, actor: &Actor, now: DateTime<Utc>) -> DeliveryOutcome {
        if self.status == JobStatus::Delivered {
            return DeliveryOutcome::default();
        }

        let stopped = self
            .tasks
            .iter_mut()
            .find_map(|task| task.end_session(actor, now));
        let entry = self.transition_to(
            JobStatus::Delivered,
            now,
            StatusSource::ManualDelivery,
            Some(actor),
        );
        DeliveryOutcome { stopped, entry }
    }

    /// Manually sets the status, then lets the derivation rule correct it.
    ///
    /// Overriding to `Delivered` goes through [`Job::deliver`]. Any other
    /// target records a manual entry and then a system entry if the derived
    /// status disagrees, so re-opening a delivered job lands on the status its
    /// tasks and reminders imply.
    pub fn override_status(&mut self, status: JobStatus, actor: &Actor, now: DateTime<Utc>) -> Vec<StatusEntry> {
        if status == JobStatus::Delivered {
            return self.deliver(actor, now).entry.into_iter().collect();
        }

        let manual = self.transition_to(status, now, StatusSource::ManualOverride, Some(actor));
        let derived = self.refresh_status(now);
        manual.into_iter().chain(derived).collect()
    }
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour up.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewTask;
    use chrono::{Duration, TimeZone as _};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn mechanic() -> Actor {
        Actor::new("u-7", "Carlos")
    }

    fn job_with_tasks(titles: &[&str]) -> (Job, Vec<TaskId>) {
        let mut job = Job::new("ABC-1234", t0());
        let mut ids = Vec::new();
        for title in titles {
            let task = NewTask::titled(*title).into_task(&job);
            ids.push(task.id);
            job.add_task(task, t0()).unwrap();
        }
        (job, ids)
    }

    #[test]
    fn test_start_then_stop_accumulates_time() {
        let (mut job, ids) = job_with_tasks(&["Alignment"]);
        job.start_task(ids[0], &mechanic(), t0()).unwrap();
        assert_eq!(job.status, JobStatus::InProgress);

        let record = job
            .stop_task(ids[0], &mechanic(), t0() + Duration::seconds(125))
            .unwrap()
            .unwrap();
        assert_eq!(record.duration_seconds, 125);
        assert_eq!(record.started_at, t0());

        let task = job.task(ids[0]).unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.time_spent_seconds, 125);
        assert!(task.started_at.is_none());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_starting_second_task_pauses_first() {
        let (mut job, ids) = job_with_tasks(&["Brakes", "Oil"]);
        job.start_task(ids[0], &mechanic(), t0()).unwrap();

        let outcome = job
            .start_task(ids[1], &mechanic(), t0() + Duration::seconds(30))
            .unwrap();

        assert_eq!(outcome.paused.len(), 1);
        assert_eq!(outcome.paused[0].task_id, ids[0]);
        assert_eq!(outcome.paused[0].duration_seconds, 30);
        assert_eq!(job.running_count(), 1);
        assert!(job.task(ids[1]).unwrap().is_running());
        assert_eq!(job.task(ids[0]).unwrap().time_spent_seconds, 30);
        assert_eq!(job.status, JobStatus::InProgress);
    }

    #[test]
    fn test_start_done_task_is_invalid_and_changes_nothing() {
        let (mut job, ids) = job_with_tasks(&["Brakes", "Oil"]);
        job.start_task(ids[0], &mechanic(), t0()).unwrap();
        job.complete_task(ids[1], &mechanic(), t0()).unwrap();
        let before = job.clone();

        let error = job.start_task(ids[1], &mechanic(), t0()).unwrap_err();
        assert!(matches!(error, Error::InvalidState(_)));
        assert_eq!(job, before);
    }

    #[test]
    fn test_stop_when_not_running_is_noop() {
        let (mut job, ids) = job_with_tasks(&["Brakes"]);
        let before = job.clone();
        assert!(job.stop_task(ids[0], &mechanic(), t0()).unwrap().is_none());
        assert_eq!(job, before);
    }

    #[test]
    fn test_start_running_task_is_noop() {
        let (mut job, ids) = job_with_tasks(&["Brakes"]);
        job.start_task(ids[0], &mechanic(), t0()).unwrap();
        let before = job.clone();
        let outcome = job
            .start_task(ids[0], &mechanic(), t0() + Duration::seconds(5))
            .unwrap();
        assert!(outcome.already_running);
        assert_eq!(job, before);
    }

    #[test]
    fn test_live_seconds_while_running() {
        let (mut job, ids) = job_with_tasks(&["Brakes"]);
        job.task_mut(ids[0]).unwrap().time_spent_seconds = 600;
        job.start_task(ids[0], &mechanic(), t0()).unwrap();

        let task = job.task(ids[0]).unwrap();
        assert_eq!(task.live_seconds(t0() + Duration::seconds(42)), 642);
        // Clock skew never produces negative sessions.
        assert_eq!(task.live_seconds(t0() - Duration::seconds(10)), 600);
        assert_eq!(job.total_time_spent(t0() + Duration::seconds(42)), 642);
    }

    #[test]
    fn test_complete_running_task_keeps_time() {
        let (mut job, ids) = job_with_tasks(&["Brakes"]);
        job.start_task(ids[0], &mechanic(), t0()).unwrap();
        let record = job
            .complete_task(ids[0], &mechanic(), t0() + Duration::seconds(60))
            .unwrap();

        assert_eq!(record.map(|rec| rec.duration_seconds), Some(60));
        let task = job.task(ids[0]).unwrap();
        assert_eq!(task.state, TaskState::Done);
        assert_eq!(task.time_spent_seconds, 60);
        assert_eq!(job.status, JobStatus::Ready);
    }

    #[test]
    fn test_delivered_stays_delivered_when_task_completes() {
        let (mut job, ids) = job_with_tasks(&["Brakes", "Oil"]);
        let outcome = job.deliver(&mechanic(), t0());
        assert!(outcome.entry.is_some());
        assert_eq!(job.status, JobStatus::Delivered);

        job.complete_task(ids[0], &mechanic(), t0()).unwrap();
        assert_eq!(job.status, JobStatus::Delivered);

        let again = job.deliver(&mechanic(), t0());
        assert!(again.entry.is_none());
        assert_eq!(job.status_history.len(), 1);
        assert_eq!(job.status_history[0].source, StatusSource::ManualDelivery);
    }

    #[test]
    fn test_deliver_stops_running_clock() {
        let (mut job, ids) = job_with_tasks(&["Brakes"]);
        job.start_task(ids[0], &mechanic(), t0()).unwrap();
        let outcome = job.deliver(&mechanic(), t0() + Duration::seconds(15));
        assert_eq!(outcome.stopped.map(|rec| rec.duration_seconds), Some(15));
        assert_eq!(job.running_count(), 0);
    }

    #[test]
    fn test_override_reopens_delivered_job() {
        let (mut job, ids) = job_with_tasks(&["Brakes"]);
        job.complete_task(ids[0], &mechanic(), t0()).unwrap();
        job.deliver(&mechanic(), t0());

        let entries = job.override_status(JobStatus::Pending, &mechanic(), t0());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, StatusSource::ManualOverride);
        assert_eq!(entries[1].source, StatusSource::SystemRule);
        assert_eq!(job.status, JobStatus::Ready);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(59), "00:59");
        assert_eq!(format_duration(125), "02:05");
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(3725), "01:02:05");
    }
}
