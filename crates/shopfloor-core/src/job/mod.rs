//! Job model: jobs, tasks, reminders, status derivation and execution arithmetic.
//!
//! Every state-changing method on [`Job`] that touches tasks or reminders
//! re-derives the job status before returning, so callers cannot forget the
//! recomputation step.

mod execution;
mod filter;
mod model;
mod reminder;
mod status;
mod task;

// Re-export all public types
pub use execution::*;
pub use filter::*;
pub use model::*;
pub use reminder::*;
pub use status::*;
pub use task::*;
