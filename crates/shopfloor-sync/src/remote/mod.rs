//! Remote store adapter: the boundary to the persistence backend.
//!
//! Every call is asynchronous and may fail. Callers never retry on their own;
//! a failed call makes the dispatcher roll back the optimistic change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopfloor_core::{
    Actor, BackendConfig, BackendKind, ExecutionRecord, Job, JobFilter, JobId, JobPatch, Reminder,
    ReminderId, ReminderPatch, ReminderStatus, Result, Task, TaskId, TaskPatch,
};

mod flaky;
mod http;
mod memory;

pub use flaky::{FlakyRemote, RemoteOp};
pub use http::HttpRemote;
pub use memory::InMemoryRemote;

/// Persistence backend for jobs and their children.
///
/// Implementations store what they are told. They do not derive statuses or
/// enforce the single-running-task rule; the client sends explicit stop calls
/// and status patches for that.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Fetches a job with its tasks and reminders. `Ok(None)` if it does not exist.
    ///
    /// # Errors
    /// Returns `RemoteFailure` when the backend cannot answer.
    async fn get_job(&self, job_id: JobId) -> Result<Option<Job>>;

    /// Lists jobs matching a filter, oldest entry first.
    ///
    /// # Errors
    /// Returns `RemoteFailure` when the backend cannot answer.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Applies a partial update to a job.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job, `RemoteFailure` otherwise.
    async fn update_job(&self, job_id: JobId, patch: &JobPatch) -> Result<()>;

    /// Creates a task and returns the stored version.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job, `RemoteFailure` otherwise.
    async fn add_task(&self, job_id: JobId, task: &Task) -> Result<Task>;

    /// Applies a partial update to a task.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task, `RemoteFailure` otherwise.
    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<()>;

    /// Deletes a task.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task, `RemoteFailure` otherwise.
    async fn delete_task(&self, task_id: TaskId) -> Result<()>;

    /// Marks a task running from `started_at`.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task, `RemoteFailure` otherwise.
    async fn start_task_execution(
        &self,
        task_id: TaskId,
        actor: &Actor,
        started_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Stops a task clock: stores the new accumulated total and appends the
    /// session record to the execution history, as one call.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown task, `RemoteFailure` otherwise.
    async fn stop_task_execution(&self, record: &ExecutionRecord, total_seconds: u64) -> Result<()>;

    /// Execution history of every task in a job, in the order it was recorded.
    ///
    /// # Errors
    /// Returns `RemoteFailure` when the backend cannot answer.
    async fn task_executions(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>>;

    /// Creates a reminder and returns the stored version.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown job, `RemoteFailure` otherwise.
    async fn add_reminder(&self, job_id: JobId, reminder: &Reminder) -> Result<Reminder>;

    /// Applies a partial update to a reminder.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder, `RemoteFailure` otherwise.
    async fn update_reminder(&self, reminder_id: ReminderId, patch: &ReminderPatch) -> Result<()>;

    /// Sets a reminder's status.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder, `RemoteFailure` otherwise.
    async fn set_reminder_status(&self, reminder_id: ReminderId, status: ReminderStatus) -> Result<()>;

    /// Deletes a reminder.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown reminder, `RemoteFailure` otherwise.
    async fn delete_reminder(&self, reminder_id: ReminderId) -> Result<()>;
}

/// Builds the remote store selected by the backend configuration.
///
/// `api_key` is passed separately so callers can resolve it from the
/// environment first.
///
/// # Errors
/// Returns an error if the seed file cannot be loaded or the HTTP client
/// cannot be built.
pub fn connect(config: &BackendConfig, api_key: Option<String>) -> Result<Arc<dyn RemoteStore>> {
    match config.kind {
        BackendKind::Memory => {
            let store = match &config.seed_path {
                Some(path) => InMemoryRemote::from_seed_file(path)?,
                None => InMemoryRemote::new(),
            };
            tracing::info!("Using in-memory backend with {} job(s)", store.job_count());
            Ok(Arc::new(store))
        }
        BackendKind::Http => {
            let store = HttpRemote::new(&config.base_url, config.timeout_seconds, api_key)?;
            tracing::info!("Using HTTP backend at {}", config.base_url);
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_connect_memory_with_seed() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("seed.json");
        let job = Job::new(
            "ABC-1234",
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        );
        fs::write(&path, serde_json::to_string(&vec![job]).unwrap()).expect("write seed");

        let config = BackendConfig {
            seed_path: Some(path),
            ..BackendConfig::default()
        };
        let store = connect(&config, None).expect("connect");
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_connect_missing_seed_fails() {
        let config = BackendConfig {
            seed_path: Some("/definitely/not/here.json".into()),
            ..BackendConfig::default()
        };
        assert!(connect(&config, None).is_err());
    }

    #[test]
    fn test_connect_http() {
        let config = BackendConfig {
            kind: BackendKind::Http,
            ..BackendConfig::default()
        };
        let store = connect(&config, Some("token".to_owned())).expect("connect");
        assert_eq!(store.name(), "http");
    }
}
