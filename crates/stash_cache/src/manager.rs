use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::{
    entry::CacheEntry,
    key::CacheKey,
    store::{MemoryCacheStore, Revalidation},
};

type Gate = Arc<Mutex<()>>;

/// Cache shared by all connection handlers.
///
/// Entries live for the whole process; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct CacheManager {
    store: MemoryCacheStore,
    in_flight: DashMap<CacheKey, Gate>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            store: MemoryCacheStore::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.store.get(key);
        debug!(
            target: "stash::cache",
            cache_key = %key,
            hit = entry.is_some(),
            "Cache lookup"
        );
        entry
    }

    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        debug!(
            target: "stash::cache",
            cache_key = %key,
            body_len = entry.body.len(),
            last_modified = %entry.last_modified,
            "Cache store"
        );
        self.store.insert(key, entry);
    }

    /// Called after the origin answered 304 for `key`.
    pub fn validate_and_refresh(
        &self,
        key: &CacheKey,
        fresh_last_modified: Option<&str>,
    ) -> Revalidation {
        let outcome = self.store.revalidate(key, fresh_last_modified);
        debug!(
            target: "stash::cache",
            cache_key = %key,
            outcome = outcome.as_str(),
            "Cache revalidation"
        );
        outcome
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Waits until no other handler is fetching `key`, then marks this
    /// caller as the fetcher until the returned guard is dropped.
    ///
    /// Callers must look the key up again once they hold the guard: the
    /// previous holder may have stored it.
    pub async fn acquire_fetch(&self, key: &CacheKey) -> FetchGuard<'_> {
        let gate = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let held = gate.clone().lock_owned().await;

        FetchGuard {
            key: key.clone(),
            gate,
            held: Some(held),
            in_flight: &self.in_flight,
        }
    }

    /// Number of keys with a fetch in progress or waiters queued.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Exclusive right to fetch one key from the origin.
pub struct FetchGuard<'a> {
    key: CacheKey,
    gate: Gate,
    held: Option<OwnedMutexGuard<()>>,
    in_flight: &'a DashMap<CacheKey, Gate>,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        // Map entry plus our own handle; anything above that is a waiter.
        self.in_flight.remove_if(&self.key, |_, gate| {
            Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) <= 2
        });
    }
}
