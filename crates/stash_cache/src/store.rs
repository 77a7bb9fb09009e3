use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::policy::CachePolicy;

/// Outcome of checking a cached entry against the origin's 304.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// Cached entry confirmed by the origin.
    Fresh(CacheEntry),
    /// Origin reports a different `Last-Modified`; the body must be refetched.
    Stale,
    /// Nothing cached under this key.
    Missing,
}

impl Revalidation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Revalidation::Fresh(_) => "fresh",
            Revalidation::Stale => "stale",
            Revalidation::Missing => "missing",
        }
    }
}

/// URL -> entry map. Readers run in parallel, writers are exclusive, and no
/// lock outlives a single call.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, entry);
    }

    pub fn revalidate(&self, key: &CacheKey, fresh_last_modified: Option<&str>) -> Revalidation {
        let Some(entry) = self.get(key) else {
            return Revalidation::Missing;
        };
        match fresh_last_modified {
            Some(fresh) if !CachePolicy::same_last_modified(&entry.last_modified, fresh) => {
                Revalidation::Stale
            }
            _ => Revalidation::Fresh(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryCacheStore, Revalidation};
    use crate::{CacheEntry, CacheKey};

    const LM: &str = "Sat, 20 Oct 2024 19:26:00 GMT";

    #[test]
    fn insert_replaces_existing_entry() {
        let store = MemoryCacheStore::new();
        let key = CacheKey::new("http://a/x");
        store.insert(key.clone(), CacheEntry::new("v1", LM));
        store.insert(key.clone(), CacheEntry::new("v2", LM));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).map(|e| e.body), Some("v2".into()));
    }

    #[test]
    fn snapshot_survives_replacement() {
        let store = MemoryCacheStore::new();
        let key = CacheKey::new("http://a/x");
        store.insert(key.clone(), CacheEntry::new("old", LM));
        let snapshot = store.get(&key).expect("cached");
        store.insert(key, CacheEntry::new("new", LM));
        assert_eq!(&snapshot.body[..], b"old");
    }

    #[test]
    fn revalidate_reports_missing_fresh_and_stale() {
        let store = MemoryCacheStore::new();
        let key = CacheKey::new("http://a/x");
        assert_eq!(store.revalidate(&key, Some(LM)), Revalidation::Missing);

        store.insert(key.clone(), CacheEntry::new("body", LM));
        assert_eq!(
            store.revalidate(&key, Some(LM)),
            Revalidation::Fresh(CacheEntry::new("body", LM))
        );
        assert!(matches!(store.revalidate(&key, None), Revalidation::Fresh(_)));
        assert_eq!(
            store.revalidate(&key, Some("Tue, 22 Oct 2024 19:26:00 GMT")),
            Revalidation::Stale
        );
    }
}
