//! Optimistic synchronization of workshop jobs.
//!
//! Views read jobs from a [`CacheStore`]. Every change runs through the
//! [`Dispatcher`], which applies it to the cache at once, sends it to a
//! [`RemoteStore`], rolls it back if the store rejects it and finally
//! re-fetches the authoritative state.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::missing_panics_doc,
        reason = "Allow for tests"
    )
)]

/// Job actions other than the task clock.
pub mod actions;
/// Cache of job detail and list views.
pub mod cache;
/// The optimistic mutation protocol.
pub mod dispatcher;
/// Task clock controller.
pub mod execution;
/// Mutation kinds.
pub mod mutation;
/// Remote store adapters.
pub mod remote;
/// Display tick for live timers.
pub mod ticker;
/// Client wiring.
pub mod workshop;

pub use actions::JobActions;
pub use cache::{CacheEntry, CacheKey, CacheSnapshot, CacheStore};
pub use dispatcher::Dispatcher;
pub use execution::{ExecutionController, StopOutcome, TimerToggle};
pub use mutation::Mutation;
pub use remote::{FlakyRemote, HttpRemote, InMemoryRemote, RemoteOp, RemoteStore, connect};
pub use ticker::DisplayTicker;
pub use workshop::Workshop;
