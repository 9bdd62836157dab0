//! In-process backend, used for demos, the CLI and tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopfloor_core::sync::IgnoreLock as _;
use shopfloor_core::{
    Actor, EntityKind, Error, ExecutionRecord, Job, JobFilter, JobId, JobPatch, Reminder,
    ReminderId, ReminderPatch, ReminderStatus, Result, Task, TaskId, TaskPatch, TaskState,
};

use super::RemoteStore;

#[derive(Default)]
struct MemoryState {
    jobs: BTreeMap<JobId, Job>,
    executions: Vec<ExecutionRecord>,
}

impl MemoryState {
    fn job_mut(&mut self, job_id: JobId) -> Result<&mut Job> {
        self.jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::not_found(EntityKind::Job, job_id))
    }

    fn task_mut(&mut self, task_id: TaskId) -> Result<&mut Task> {
        self.jobs
            .values_mut()
            .flat_map(|job| job.tasks.iter_mut())
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))
    }

    fn reminder_mut(&mut self, reminder_id: ReminderId) -> Result<&mut Reminder> {
        self.jobs
            .values_mut()
            .flat_map(|job| job.reminders.iter_mut())
            .find(|reminder| reminder.id == reminder_id)
            .ok_or_else(|| Error::not_found(EntityKind::Reminder, reminder_id))
    }
}

/// Remote store kept entirely in memory.
///
/// Holds jobs keyed by id plus the execution history. State lives behind a
/// plain mutex that is never held across an await point.
#[derive(Default)]
pub struct InMemoryRemote {
    state: Mutex<MemoryState>,
}

impl InMemoryRemote {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `jobs`.
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let jobs = jobs.into_iter().map(|job| (job.id, job)).collect();
        Self {
            state: Mutex::new(MemoryState {
                jobs,
                executions: Vec::new(),
            }),
        }
    }

    /// Loads a JSON array of jobs.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a job array.
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("Failed to read seed file {}: {error}", path.display()))
        })?;
        let jobs: Vec<Job> = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded {} job(s) from {:?}", jobs.len(), path);
        Ok(Self::with_jobs(jobs))
    }

    /// Inserts or replaces a job.
    pub fn insert_job(&self, job: Job) {
        self.state.lock_ignore_poison().jobs.insert(job.id, job);
    }

    /// Removes a job, as if deleted by another client.
    pub fn remove_job(&self, job_id: JobId) -> Option<Job> {
        self.state.lock_ignore_poison().jobs.remove(&job_id)
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.state.lock_ignore_poison().jobs.len()
    }

    /// Copy of every stored job, ordered by id.
    pub fn jobs(&self) -> Vec<Job> {
        self.state.lock_ignore_poison().jobs.values().cloned().collect()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<Job>> {
        Ok(self.state.lock_ignore_poison().jobs.get(&job_id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let state = self.state.lock_ignore_poison();
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.entry_at);
        Ok(jobs)
    }

    async fn update_job(&self, job_id: JobId, patch: &JobPatch) -> Result<()> {
        self.state
            .lock_ignore_poison()
            .job_mut(job_id)?
            .apply_patch(patch);
        Ok(())
    }

    async fn add_task(&self, job_id: JobId, task: &Task) -> Result<Task> {
        let mut state = self.state.lock_ignore_poison();
        let job = state.job_mut(job_id)?;
        let mut stored = task.clone();
        stored.job_id = job_id;
        job.tasks.push(stored.clone());
        Ok(stored)
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<()> {
        patch.apply(self.state.lock_ignore_poison().task_mut(task_id)?);
        Ok(())
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let mut state = self.state.lock_ignore_poison();
        for job in state.jobs.values_mut() {
            if let Some(index) = job.tasks.iter().position(|task| task.id == task_id) {
                job.tasks.remove(index);
                return Ok(());
            }
        }
        Err(Error::not_found(EntityKind::Task, task_id))
    }

    async fn start_task_execution(
        &self,
        task_id: TaskId,
        actor: &Actor,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock_ignore_poison();
        let task = state.task_mut(task_id)?;
        task.state = TaskState::Running;
        task.started_at = Some(started_at);
        task.last_executor = Some(actor.clone());
        Ok(())
    }

    async fn stop_task_execution(&self, record: &ExecutionRecord, total_seconds: u64) -> Result<()> {
        let mut state = self.state.lock_ignore_poison();
        let task = state.task_mut(record.task_id)?;
        task.state = TaskState::Pending;
        task.started_at = None;
        task.time_spent_seconds = total_seconds;
        state.executions.push(record.clone());
        Ok(())
    }

    async fn task_executions(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .state
            .lock_ignore_poison()
            .executions
            .iter()
            .filter(|record| record.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn add_reminder(&self, job_id: JobId, reminder: &Reminder) -> Result<Reminder> {
        let mut state = self.state.lock_ignore_poison();
        let job = state.job_mut(job_id)?;
        let mut stored = reminder.clone();
        stored.job_id = job_id;
        job.reminders.push(stored.clone());
        Ok(stored)
    }

    async fn update_reminder(&self, reminder_id: ReminderId, patch: &ReminderPatch) -> Result<()> {
        patch.apply(self.state.lock_ignore_poison().reminder_mut(reminder_id)?);
        Ok(())
    }

    async fn set_reminder_status(&self, reminder_id: ReminderId, status: ReminderStatus) -> Result<()> {
        self.state
            .lock_ignore_poison()
            .reminder_mut(reminder_id)?
            .status = status;
        Ok(())
    }

    async fn delete_reminder(&self, reminder_id: ReminderId) -> Result<()> {
        let mut state = self.state.lock_ignore_poison();
        for job in state.jobs.values_mut() {
            if let Some(index) = job
                .reminders
                .iter()
                .position(|reminder| reminder.id == reminder_id)
            {
                job.reminders.remove(index);
                return Ok(());
            }
        }
        Err(Error::not_found(EntityKind::Reminder, reminder_id))
    }
}
