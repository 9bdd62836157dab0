//! Task execution controller: the start/stop entry points for task clocks.

use std::sync::Arc;

use shopfloor_core::{
    Actor, Clock, EntityKind, Error, ExecutionRecord, JobId, Result, StartOutcome, TaskId,
};

use crate::dispatcher::Dispatcher;
use crate::mutation::{StartTask, StopTask};

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The clock was running and has been stopped
    Stopped(ExecutionRecord),
    /// The task was not running; nothing changed
    NotRunning,
}

/// Result of a timer toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerToggle {
    /// The task was idle and has been started
    Started(StartOutcome),
    /// The task was running and has been stopped
    Stopped(StopOutcome),
}

/// Starts and stops task clocks through the dispatcher.
///
/// Tasks are located through the cache, so the owning job must have been
/// loaded (the views calling this always have it).
pub struct ExecutionController {
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

impl ExecutionController {
    /// Creates a controller.
    pub fn new(dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self { dispatcher, clock }
    }

    /// Starts the clock on `task_id`, pausing any other running task of the job.
    ///
    /// # Errors
    /// `InvalidState` if the task is done, `NotFound` if it is unknown, or the
    /// remote error after rollback.
    pub async fn start(&self, task_id: TaskId, actor: &Actor) -> Result<StartOutcome> {
        let job_id = self.owner(task_id)?;
        let mutation = StartTask {
            job_id,
            task_id,
            actor: actor.clone(),
            at: self.clock.now(),
        };

        match self.dispatcher.mutate(&mutation).await? {
            Some(paused) => {
                for record in &paused {
                    tracing::info!(
                        "Paused task {} after {}s",
                        record.task_id,
                        record.duration_seconds
                    );
                }
                tracing::info!("{actor} started task {task_id}");
                Ok(StartOutcome {
                    paused,
                    already_running: false,
                })
            }
            None => Ok(StartOutcome {
                paused: Vec::new(),
                already_running: true,
            }),
        }
    }

    /// Stops the clock on `task_id`. Stopping an idle task is reported, not an error.
    ///
    /// # Errors
    /// `NotFound` if the task is unknown, or the remote error after rollback.
    pub async fn stop(&self, task_id: TaskId, actor: &Actor) -> Result<StopOutcome> {
        let job_id = self.owner(task_id)?;
        let mutation = StopTask {
            job_id,
            task_id,
            actor: actor.clone(),
            at: self.clock.now(),
        };

        match self.dispatcher.mutate(&mutation).await? {
            Some(record) => {
                tracing::info!(
                    "{actor} stopped task {task_id} after {}s",
                    record.duration_seconds
                );
                Ok(StopOutcome::Stopped(record))
            }
            None => {
                tracing::info!("Task {task_id} is not running, nothing to stop");
                Ok(StopOutcome::NotRunning)
            }
        }
    }

    /// Stops the task if it runs, starts it otherwise.
    ///
    /// # Errors
    /// Same as [`ExecutionController::start`] and [`ExecutionController::stop`].
    pub async fn toggle(&self, task_id: TaskId, actor: &Actor) -> Result<TimerToggle> {
        let job_id = self.owner(task_id)?;
        let running = self
            .dispatcher
            .cache()
            .read_job(job_id)
            .and_then(|job| job.task(task_id).map(|task| task.is_running()))
            .unwrap_or(false);

        if running {
            self.stop(task_id, actor).await.map(TimerToggle::Stopped)
        } else {
            self.start(task_id, actor).await.map(TimerToggle::Started)
        }
    }

    /// Seconds to display for a task right now, including the running session.
    pub fn live_seconds(&self, task_id: TaskId) -> Option<u64> {
        let job_id = self.dispatcher.cache().job_of_task(task_id)?;
        let job = self.dispatcher.cache().read_job(job_id)?;
        job.task(task_id)
            .map(|task| task.live_seconds(self.clock.now()))
    }

    fn owner(&self, task_id: TaskId) -> Result<JobId> {
        self.dispatcher
            .cache()
            .job_of_task(task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))
    }
}
