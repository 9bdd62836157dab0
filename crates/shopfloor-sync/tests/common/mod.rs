//! Shared fixtures for the synchronization integration tests.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Each test binary uses a different subset of the fixtures"
)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone as _, Utc};
use shopfloor_core::{
    Actor, Clock, Job, JobFilter, JobId, ManualClock, NewReminder, NewTask, ReconcileMode,
    ReminderId, SyncConfig, TaskId,
};
use shopfloor_sync::{FlakyRemote, InMemoryRemote, RemoteOp, RemoteStore, Workshop};

/// Monday morning, shop opens.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
}

/// The mechanic performing every action.
pub fn mechanic() -> Actor {
    Actor::new("u-7", "Carlos")
}

/// A pending job with one idle task per title.
pub fn job_with_tasks(label: &str, titles: &[&str]) -> (Job, Vec<TaskId>) {
    let mut job = Job::new(label, t0());
    let mut ids = Vec::new();
    for title in titles {
        let task = NewTask::titled(*title).into_task(&job);
        ids.push(task.id);
        job.add_task(task, t0()).unwrap();
    }
    (job, ids)
}

/// Adds an active reminder to a job that is not stored anywhere yet.
pub fn with_reminder(job: &mut Job, title: &str) -> ReminderId {
    let reminder = NewReminder::titled(title).into_reminder(job.id);
    let reminder_id = reminder.id;
    job.add_reminder(reminder, t0()).unwrap();
    reminder_id
}

/// A workshop over a failure-injecting in-memory backend and a manual clock,
/// with every job loaded into the cache and the `all` list view cached.
pub struct Fixture {
    pub workshop: Arc<Workshop>,
    pub remote: Arc<FlakyRemote>,
    pub store: Arc<InMemoryRemote>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub async fn new(jobs: Vec<Job>, reconcile: ReconcileMode) -> Self {
        let store = Arc::new(InMemoryRemote::with_jobs(jobs.clone()));
        let remote = Arc::new(FlakyRemote::new(
            Arc::clone(&store) as Arc<dyn RemoteStore>
        ));
        let clock = Arc::new(ManualClock::new(t0()));
        let config = SyncConfig {
            reconcile,
            refresh_lists: true,
        };
        let workshop = Arc::new(Workshop::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            config,
        ));

        workshop
            .dispatcher()
            .load_list(JobFilter::all())
            .await
            .unwrap();
        for job in &jobs {
            workshop.dispatcher().load_job(job.id).await.unwrap();
        }

        Self {
            workshop,
            remote,
            store,
            clock,
        }
    }

    pub async fn inline(jobs: Vec<Job>) -> Self {
        Self::new(jobs, ReconcileMode::Inline).await
    }

    /// The job as views currently see it.
    pub fn cached(&self, job_id: JobId) -> Job {
        self.workshop.cache().read_job(job_id).unwrap()
    }

    /// The job as the backend holds it.
    pub async fn stored(&self, job_id: JobId) -> Job {
        self.store.get_job(job_id).await.unwrap().unwrap()
    }

    /// Canonical bytes of the whole cache.
    pub fn export(&self) -> Vec<u8> {
        self.workshop.cache().export().unwrap()
    }

    /// Blocks reconciliation reads so the cache keeps whatever it has.
    pub fn fail_reads(&self) {
        self.remote.fail(RemoteOp::GetJob);
        self.remote.fail(RemoteOp::ListJobs);
    }
}
