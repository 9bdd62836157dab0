//! Client-side cache of jobs and list views.

mod key;
mod store;

pub use key::CacheKey;
pub use store::{CacheEntry, CacheSnapshot, CacheStore};
pub(crate) use store::Applied;
