use bytes::Bytes;

/// Immutable snapshot of a cached body.
///
/// Cloning shares the body buffer; a clone stays valid even if the store
/// replaces the entry afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Bytes,
    pub last_modified: String,
}

impl CacheEntry {
    pub fn new(body: impl Into<Bytes>, last_modified: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            last_modified: last_modified.into(),
        }
    }
}
