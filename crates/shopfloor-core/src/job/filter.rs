//! List-view filters for jobs

use serde::{Deserialize, Serialize};

use super::model::Job;
use super::status::JobStatus;

/// Filter behind a list or dashboard view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs in this status
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Include archived jobs
    #[serde(default)]
    pub include_archived: bool,
}

impl JobFilter {
    /// Filter matching every non-archived job.
    pub const fn all() -> Self {
        Self {
            status: None,
            include_archived: false,
        }
    }

    /// Filter matching non-archived jobs in `status`.
    pub const fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            include_archived: false,
        }
    }

    /// Whether `job` belongs in the view.
    pub fn matches(&self, job: &Job) -> bool {
        if job.archived && !self.include_archived {
            return false;
        }
        self.status.is_none_or(|status| status == job.status)
    }

    /// Stable textual form used in cache keys, e.g. `all`, `status=ready&archived`.
    pub fn signature(&self) -> String {
        let mut parts = Vec::new();
        if let Some(status) = self.status {
            parts.push(format!("status={}", status.as_str()));
        }
        if self.include_archived {
            parts.push("archived".to_owned());
        }
        if parts.is_empty() {
            "all".to_owned()
        } else {
            parts.join("&")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};

    #[test]
    fn test_signature_is_stable() {
        assert_eq!(JobFilter::all().signature(), "all");
        assert_eq!(JobFilter::with_status(JobStatus::Ready).signature(), "status=ready");
        let filter = JobFilter {
            status: Some(JobStatus::InProgress),
            include_archived: true,
        };
        assert_eq!(filter.signature(), "status=in_progress&archived");
    }

    #[test]
    fn test_archived_jobs_are_hidden_by_default() {
        let mut job = Job::new("ABC", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(JobFilter::all().matches(&job));
        job.archived = true;
        assert!(!JobFilter::all().matches(&job));
        let archived = JobFilter {
            status: None,
            include_archived: true,
        };
        assert!(archived.matches(&job));
        assert!(!JobFilter::with_status(JobStatus::Ready).matches(&job));
    }
}
