use serde::Deserialize;

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Concurrent misses for the same URL wait for a single origin fetch.
    pub coalesce_misses: bool,
    /// Send `If-Modified-Since` to the origin on every hit.
    pub revalidate_on_hit: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            coalesce_misses: true,
            revalidate_on_hit: false,
        }
    }
}

impl CacheConfig {
    pub fn coalesce_misses(&self) -> bool {
        self.coalesce_misses
    }

    pub fn revalidate_on_hit(&self) -> bool {
        self.revalidate_on_hit
    }
}
