//! Cache storage: whole-entry reads, snapshots and rollback.
//!
//! Entries are only ever replaced whole. A snapshot copies every entry a job
//! appears in, and restoring it puts those exact values back, so a reader
//! never sees half of one mutation mixed with half of another.

use core::slice;
use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use shopfloor_core::sync::IgnoreLock as _;
use shopfloor_core::{EntityKind, Error, Job, JobFilter, JobId, ReminderId, Result, TaskId};

use super::key::CacheKey;

/// Value stored under a cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheEntry {
    /// Detail view of one job
    Job(Job),
    /// List view
    Jobs {
        /// Filter the list was fetched with
        filter: JobFilter,
        /// Jobs in display order
        jobs: Vec<Job>,
    },
}

impl CacheEntry {
    fn contains(&self, job_id: JobId) -> bool {
        match self {
            Self::Job(job) => job.id == job_id,
            Self::Jobs { jobs, .. } => jobs.iter().any(|job| job.id == job_id),
        }
    }

    fn find(&self, job_id: JobId) -> Option<&Job> {
        match self {
            Self::Job(job) => (job.id == job_id).then_some(job),
            Self::Jobs { jobs, .. } => jobs.iter().find(|job| job.id == job_id),
        }
    }

    /// Replaces the copy of `job` held by this entry, if any.
    fn replace(&mut self, job: &Job) {
        match self {
            Self::Job(current) => {
                if current.id == job.id {
                    current.clone_from(job);
                }
            }
            Self::Jobs { jobs, .. } => {
                for current in jobs.iter_mut().filter(|current| current.id == job.id) {
                    current.clone_from(job);
                }
            }
        }
    }

    fn iter_jobs(&self) -> impl Iterator<Item = &Job> {
        let jobs: &[Job] = match self {
            Self::Job(job) => slice::from_ref(job),
            Self::Jobs { jobs, .. } => jobs,
        };
        jobs.iter()
    }
}

/// Copy of every entry a mutation could touch, taken before it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    entries: Vec<(CacheKey, CacheEntry)>,
}

impl CacheSnapshot {
    /// Keys captured by the snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|(key, _)| key)
    }
}

/// An optimistic change that has been written to the cache.
pub(crate) struct Applied<P> {
    /// Whatever the transform reported back
    pub plan: P,
    /// Entries as they were before the change
    pub snapshot: CacheSnapshot,
    /// Job before the change
    pub before: Job,
    /// Job after the change
    pub after: Job,
}

/// Shared cache of job detail and list views.
///
/// Readers may call any method. Writes are crate-private and go through the
/// dispatcher. The lock is only held for synchronous work, never across an
/// await point.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<BTreeMap<CacheKey, CacheEntry>>,
}

impl CacheStore {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a job, from its detail entry or any list holding it.
    pub fn read_job(&self, job_id: JobId) -> Option<Job> {
        let entries = self.entries.lock_ignore_poison();
        Self::find_job(&entries, job_id).cloned()
    }

    /// Current contents of the list view for `filter`.
    pub fn read_list(&self, filter: &JobFilter) -> Option<Vec<Job>> {
        match self
            .entries
            .lock_ignore_poison()
            .get(&CacheKey::for_filter(filter))
        {
            Some(CacheEntry::Jobs { jobs, .. }) => Some(jobs.clone()),
            _ => None,
        }
    }

    /// Raw entry under `key`.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock_ignore_poison().get(key).cloned()
    }

    /// Every key currently cached, in order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.lock_ignore_poison().keys().cloned().collect()
    }

    /// Filters of every cached list view.
    pub fn list_filters(&self) -> Vec<JobFilter> {
        self.entries
            .lock_ignore_poison()
            .values()
            .filter_map(|entry| match entry {
                CacheEntry::Jobs { filter, .. } => Some(*filter),
                CacheEntry::Job(_) => None,
            })
            .collect()
    }

    /// Job owning `task_id`, as far as the cache knows.
    pub fn job_of_task(&self, task_id: TaskId) -> Option<JobId> {
        self.find_owner(|job| job.task(task_id).is_some())
    }

    /// Job owning `reminder_id`, as far as the cache knows.
    pub fn job_of_reminder(&self, reminder_id: ReminderId) -> Option<JobId> {
        self.find_owner(|job| job.reminder(reminder_id).is_some())
    }

    /// Canonical JSON of every entry, ordered by key.
    ///
    /// Two caches export the same bytes exactly when they hold the same data.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn export(&self) -> Result<Vec<u8>> {
        let entries = self.entries.lock_ignore_poison();
        let keyed: BTreeMap<String, &CacheEntry> = entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry))
            .collect();
        Ok(serde_json::to_vec(&keyed)?)
    }

    fn find_owner(&self, predicate: impl Fn(&Job) -> bool) -> Option<JobId> {
        self.entries
            .lock_ignore_poison()
            .values()
            .flat_map(CacheEntry::iter_jobs)
            .find(|job| predicate(job))
            .map(|job| job.id)
    }

    fn find_job(entries: &BTreeMap<CacheKey, CacheEntry>, job_id: JobId) -> Option<&Job> {
        entries
            .get(&CacheKey::Job(job_id))
            .and_then(|entry| entry.find(job_id))
            .or_else(|| entries.values().find_map(|entry| entry.find(job_id)))
    }

    /// Snapshots, transforms and writes back one job under a single lock.
    ///
    /// The transform works on a copy. If it fails or reports nothing to do,
    /// the cache is left untouched.
    pub(crate) fn apply_optimistic<P>(
        &self,
        job_id: JobId,
        transform: impl FnOnce(&mut Job) -> Result<Option<P>>,
    ) -> Result<Option<Applied<P>>> {
        let mut entries = self.entries.lock_ignore_poison();
        let before = Self::find_job(&entries, job_id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Job, job_id))?;

        let mut after = before.clone();
        let Some(plan) = transform(&mut after)? else {
            return Ok(None);
        };

        let snapshot = CacheSnapshot {
            entries: entries
                .iter()
                .filter(|(_, entry)| entry.contains(job_id))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
        };
        for entry in entries.values_mut() {
            entry.replace(&after);
        }
        tracing::debug!(
            "Optimistic update of job {} touched {} cache entr(ies)",
            job_id,
            snapshot.entries.len()
        );

        Ok(Some(Applied {
            plan,
            snapshot,
            before,
            after,
        }))
    }

    /// Puts every snapshotted entry back verbatim.
    pub(crate) fn restore(&self, snapshot: CacheSnapshot) {
        let mut entries = self.entries.lock_ignore_poison();
        for (key, entry) in snapshot.entries {
            entries.insert(key, entry);
        }
    }

    /// Stores an authoritative copy of a job: its detail entry and every list
    /// already holding it.
    pub(crate) fn store_job(&self, job: Job) {
        let mut entries = self.entries.lock_ignore_poison();
        for entry in entries.values_mut() {
            entry.replace(&job);
        }
        entries.insert(CacheKey::Job(job.id), CacheEntry::Job(job));
    }

    /// Stores an authoritative list view.
    pub(crate) fn store_list(&self, filter: JobFilter, jobs: Vec<Job>) {
        self.entries
            .lock_ignore_poison()
            .insert(CacheKey::for_filter(&filter), CacheEntry::Jobs { filter, jobs });
    }

    /// Forgets a job that no longer exists remotely.
    pub(crate) fn evict_job(&self, job_id: JobId) {
        let mut entries = self.entries.lock_ignore_poison();
        entries.remove(&CacheKey::Job(job_id));
        for entry in entries.values_mut() {
            if let CacheEntry::Jobs { jobs, .. } = entry {
                jobs.retain(|job| job.id != job_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};
    use shopfloor_core::{JobStatus, NewReminder};

    fn job(label: &str) -> Job {
        Job::new(label, Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
    }

    fn add_reminder(job: &mut Job) -> Result<Option<()>> {
        let reminder = NewReminder::titled("Call customer").into_reminder(job.id);
        job.add_reminder(reminder, job.entry_at)?;
        Ok(Some(()))
    }

    #[test]
    fn test_optimistic_apply_updates_detail_and_lists() {
        let cache = CacheStore::new();
        let first = job("AAA");
        let second = job("BBB");
        cache.store_list(JobFilter::all(), vec![first.clone(), second.clone()]);
        cache.store_job(first.clone());

        let applied = cache
            .apply_optimistic(first.id, add_reminder)
            .unwrap()
            .unwrap();

        assert_eq!(applied.snapshot.keys().count(), 2);
        assert_eq!(applied.after.status, JobStatus::Reminder);
        assert_eq!(cache.read_job(first.id).unwrap().status, JobStatus::Reminder);
        let list = cache.read_list(&JobFilter::all()).unwrap();
        assert_eq!(list[0].status, JobStatus::Reminder);
        assert_eq!(list[1], second);
    }

    #[test]
    fn test_restore_is_byte_identical() {
        let cache = CacheStore::new();
        let first = job("AAA");
        cache.store_list(JobFilter::all(), vec![first.clone()]);
        cache.store_job(first.clone());
        let before = cache.export().unwrap();

        let applied = cache
            .apply_optimistic(first.id, add_reminder)
            .unwrap()
            .unwrap();
        assert_ne!(cache.export().unwrap(), before);

        cache.restore(applied.snapshot);
        assert_eq!(cache.export().unwrap(), before);
    }

    #[test]
    fn test_failed_transform_leaves_cache_untouched() {
        let cache = CacheStore::new();
        let first = job("AAA");
        cache.store_job(first.clone());
        let before = cache.export().unwrap();

        let result = cache.apply_optimistic(first.id, |job: &mut Job| -> Result<Option<()>> {
            job.vehicle_label = "changed".to_owned();
            Err(Error::InvalidState("rejected".to_owned()))
        });
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(cache.export().unwrap(), before);

        let noop = cache
            .apply_optimistic(first.id, |_: &mut Job| Ok(None::<()>))
            .unwrap();
        assert!(noop.is_none());
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let cache = CacheStore::new();
        let result = cache.apply_optimistic(JobId::new(), add_reminder);
        assert!(matches!(
            result,
            Err(Error::NotFound {
                kind: EntityKind::Job,
                ..
            })
        ));
    }

    #[test]
    fn test_evict_removes_detail_and_list_rows() {
        let cache = CacheStore::new();
        let first = job("AAA");
        let second = job("BBB");
        cache.store_list(JobFilter::all(), vec![first.clone(), second.clone()]);
        cache.store_job(first.clone());

        cache.evict_job(first.id);
        assert!(cache.read_job(first.id).is_none());
        assert_eq!(cache.read_list(&JobFilter::all()).unwrap(), vec![second]);
        assert_eq!(cache.keys(), vec![CacheKey::Jobs("all".to_owned())]);
    }

    #[test]
    fn test_owner_lookup() {
        let cache = CacheStore::new();
        let mut first = job("AAA");
        let reminder = NewReminder::titled("Call").into_reminder(first.id);
        let reminder_id = reminder.id;
        first.reminders.push(reminder);
        cache.store_list(JobFilter::all(), vec![first.clone()]);

        assert_eq!(cache.job_of_reminder(reminder_id), Some(first.id));
        assert_eq!(cache.job_of_task(TaskId::new()), None);
        assert_eq!(cache.list_filters(), vec![JobFilter::all()]);
    }
}
