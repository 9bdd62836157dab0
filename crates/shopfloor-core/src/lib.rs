//! Core types for the workshop job-tracking core.
//!
//! This crate holds the job data model, the status derivation engine, the pure
//! task-execution arithmetic, the clock abstraction, error handling and
//! configuration shared by the synchronization layer.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

/// Clock abstraction used for every timestamp the core produces.
pub mod clock;
/// Configuration loading and defaults.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Unique identifiers for jobs, tasks, reminders and history entries.
pub mod ids;
/// Job, task and reminder model plus status derivation.
pub mod job;
/// Lock helpers.
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendConfig, BackendKind, LoggingConfig, ReconcileMode, ShopfloorConfig, SyncConfig};
pub use error::{EntityKind, Error, Result};
pub use ids::{JobId, ReminderId, StatusEntryId, TaskId};
pub use job::*;
