//! Optimistic mutation dispatcher.
//!
//! Every change to a job goes through [`Dispatcher::mutate`]:
//!
//! 1. snapshot the cache entries holding the job,
//! 2. apply the mutation's transform to the cache synchronously,
//! 3. send the remote calls,
//! 4. on failure restore the snapshot verbatim and return the error,
//! 5. in every case reconcile the job (and cached lists) from the remote store.
//!
//! Mutation kinds only provide the transform and the remote calls. Status
//! changes produced by the transform are persisted here, after the
//! mutation's own calls, so no kind has to remember to do it.
//!
//! Concurrent mutations on one job each persist the status their own copy
//! derived, so the last write can be stale. Reconciliation re-derives the
//! status of the fetched job and writes a correction before caching it.

use std::mem;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use shopfloor_core::sync::IgnoreLock as _;
use shopfloor_core::{
    Clock, EntityKind, Error, Job, JobFilter, JobId, JobPatch, ReconcileMode, Result,
    StatusEntry, SyncConfig,
};
use tokio::task::JoinHandle;

use crate::cache::{Applied, CacheStore};
use crate::mutation::Mutation;
use crate::remote::RemoteStore;

/// Runs mutations against the shared cache and the remote store.
pub struct Dispatcher {
    cache: Arc<CacheStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    /// Background reconciliations that have not been awaited yet
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty cache.
    pub fn new(remote: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self::with_cache(Arc::new(CacheStore::new()), remote, clock, config)
    }

    /// Creates a dispatcher over an existing cache.
    pub fn with_cache(
        cache: Arc<CacheStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            cache,
            remote,
            clock,
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// The cache read by views.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// The remote store mutations are sent to.
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Fetches a job and caches it under `job:<id>`.
    ///
    /// # Errors
    /// Returns `NotFound` if the job does not exist remotely, or the remote
    /// error if the fetch fails.
    pub async fn load_job(&self, job_id: JobId) -> Result<Job> {
        match self.remote.get_job(job_id).await? {
            Some(job) => {
                self.cache.store_job(job.clone());
                Ok(job)
            }
            None => {
                self.cache.evict_job(job_id);
                Err(Error::not_found(EntityKind::Job, job_id))
            }
        }
    }

    /// Fetches a list view and caches it under `jobs:<signature>`.
    ///
    /// # Errors
    /// Returns the remote error if the fetch fails.
    pub async fn load_list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let jobs = self.remote.list_jobs(&filter).await?;
        self.cache.store_list(filter, jobs.clone());
        Ok(jobs)
    }

    /// Runs one mutation through the optimistic protocol.
    ///
    /// Returns `Ok(None)` when the transform reports nothing to do; no remote
    /// call is made in that case.
    ///
    /// # Errors
    /// Local rejections (`InvalidState`, `NotFound`) are returned before the
    /// cache is touched. Remote errors are returned after the cache has been
    /// rolled back.
    pub async fn mutate<M: Mutation>(&self, mutation: &M) -> Result<Option<M::Output>> {
        let job_id = mutation.job_id();
        if self.cache.read_job(job_id).is_none() {
            self.load_job(job_id).await?;
        }

        let Some(applied) = self
            .cache
            .apply_optimistic(job_id, |job| mutation.apply(job))?
        else {
            tracing::debug!("{} on job {job_id} changed nothing", mutation.name());
            return Ok(None);
        };
        let Applied {
            plan,
            snapshot,
            before,
            after,
        } = applied;

        let result = match mutation.commit(self.remote.as_ref(), &plan, &after).await {
            Ok(output) => persist_status(self.remote.as_ref(), &before, &after)
                .await
                .map(|()| output),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            self.cache.restore(snapshot);
            tracing::warn!(
                "{} on job {job_id} failed, rolled back: {err}",
                mutation.name()
            );
        }

        self.settle(job_id).await;
        result.map(Some)
    }

    /// Re-fetches a job (and cached lists, when configured) and awaits it.
    pub async fn reconcile(&self, job_id: JobId) {
        reconcile(
            &self.cache,
            self.remote.as_ref(),
            self.clock.as_ref(),
            job_id,
            self.config.refresh_lists,
        )
        .await;
    }

    /// Waits for every background reconciliation started so far.
    pub async fn settled(&self) {
        loop {
            let handles = mem::take(&mut *self.pending.lock_ignore_poison());
            if handles.is_empty() {
                return;
            }
            for outcome in join_all(handles).await {
                if let Err(err) = outcome {
                    tracing::warn!("Reconciliation task did not finish: {err}");
                }
            }
        }
    }

    async fn settle(&self, job_id: JobId) {
        match self.config.reconcile {
            ReconcileMode::Inline => self.reconcile(job_id).await,
            ReconcileMode::Background => {
                let cache = Arc::clone(&self.cache);
                let remote = Arc::clone(&self.remote);
                let clock = Arc::clone(&self.clock);
                let refresh_lists = self.config.refresh_lists;
                let handle = tokio::spawn(async move {
                    reconcile(&cache, remote.as_ref(), clock.as_ref(), job_id, refresh_lists).await;
                });
                let mut pending = self.pending.lock_ignore_poison();
                pending.retain(|handle| !handle.is_finished());
                pending.push(handle);
            }
        }
    }
}

/// Sends the status change a transform produced, if any.
async fn persist_status(remote: &dyn RemoteStore, before: &Job, after: &Job) -> Result<()> {
    let appended: Vec<StatusEntry> = after
        .status_history
        .iter()
        .skip(before.status_history.len())
        .cloned()
        .collect();
    if after.status == before.status && appended.is_empty() {
        return Ok(());
    }
    remote
        .update_job(after.id, &JobPatch::status_change(after.status, appended))
        .await
}

/// Writes the derived status back when the stored one is stale.
///
/// On a failed write the fetched job keeps its stored status, so the cache
/// never shows a status the backend does not have.
async fn correct_status(remote: &dyn RemoteStore, job: &mut Job, clock: &dyn Clock) {
    let stored = job.clone();
    let Some(entry) = job.refresh_status(clock.now()) else {
        return;
    };
    tracing::warn!(
        "Job {} stored as {} but derives {}, correcting",
        job.id,
        stored.status,
        job.status
    );
    let patch = JobPatch::status_change(job.status, vec![entry]);
    if let Err(err) = remote.update_job(job.id, &patch).await {
        tracing::warn!("Correcting status of job {} failed: {err}", job.id);
        *job = stored;
    }
}

/// Overwrites the cache with the remote state. The last fetch to finish wins.
///
/// A fetched job whose stored status disagrees with its tasks and reminders
/// gets the derived status written back first.
///
/// Failures are logged and otherwise ignored: the cache keeps whatever it
/// held, optimistic or not.
async fn reconcile(
    cache: &CacheStore,
    remote: &dyn RemoteStore,
    clock: &dyn Clock,
    job_id: JobId,
    refresh_lists: bool,
) {
    match remote.get_job(job_id).await {
        Ok(Some(mut job)) => {
            correct_status(remote, &mut job, clock).await;
            tracing::debug!("Reconciled job {job_id} from {}", remote.name());
            cache.store_job(job);
        }
        Ok(None) => {
            tracing::info!("Job {job_id} no longer exists remotely, evicting it");
            cache.evict_job(job_id);
        }
        Err(err) => tracing::warn!("Reconciling job {job_id} failed: {err}"),
    }

    if !refresh_lists {
        return;
    }
    for filter in cache.list_filters() {
        match remote.list_jobs(&filter).await {
            Ok(jobs) => cache.store_list(filter, jobs),
            Err(err) => tracing::warn!("Refreshing list '{}' failed: {err}", filter.signature()),
        }
    }
}
