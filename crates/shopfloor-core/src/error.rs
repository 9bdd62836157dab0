use core::result::Result as CoreResult;
use std::fmt;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A service job
    Job,
    /// A task belonging to a job
    Task,
    /// A reminder belonging to a job
    Reminder,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Job => "Job",
            Self::Task => "Task",
            Self::Reminder => "Reminder",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the job execution and synchronization core.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation is forbidden by the current state of the task or job.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The remote store rejected the call or could not be reached.
    #[error("Remote store failure: {0}")]
    RemoteFailure(String),

    /// The entity does not exist (locally or remotely).
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing entity
        kind: EntityKind,
        /// Identifier that was looked up
        id: String,
    },

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),
}

impl Error {
    /// Builds a `NotFound` error for the given entity.
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether the caller may reasonably try the operation again.
    ///
    /// Nothing in the core retries on its own; this only tells the caller that
    /// the failure was transient rather than a rejected transition.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RemoteFailure(_))
    }
}
