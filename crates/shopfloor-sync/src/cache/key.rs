use std::fmt;

use shopfloor_core::{JobFilter, JobId};

/// Address of a cache entry: `job:<id>` or `jobs:<filterSignature>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    /// Detail view of one job
    Job(JobId),
    /// List view, keyed by the filter signature
    Jobs(String),
}

impl CacheKey {
    /// Key of the list view for `filter`.
    pub fn for_filter(filter: &JobFilter) -> Self {
        Self::Jobs(filter.signature())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(id) => write!(f, "job:{id}"),
            Self::Jobs(signature) => write!(f, "jobs:{signature}"),
        }
    }
}
