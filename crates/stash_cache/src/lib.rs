//! Shared response cache.
//!
//! One process-wide [`CacheManager`] is created at startup and handed to every
//! connection handler. It maps canonical URLs to the last good body seen for
//! them and keeps the per-URL gates used to collapse concurrent misses.

mod entry;
mod key;
mod manager;
mod policy;
mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use manager::{CacheManager, FetchGuard};
pub use policy::CachePolicy;
pub use store::{MemoryCacheStore, Revalidation};
