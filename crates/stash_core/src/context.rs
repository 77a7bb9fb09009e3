use std::sync::Arc;

use stash_cache::CacheManager;
use stash_config::{HttpConfig, StashConfig};
use stash_proxy::{OriginClient, TargetResolver};

/// Everything a connection handler needs, built once at startup and shared
/// by every spawned worker.
#[derive(Debug)]
pub struct ProxyContext {
    pub(crate) cache: Arc<CacheManager>,
    pub(crate) resolver: TargetResolver,
    pub(crate) origin: OriginClient,
    pub(crate) http: HttpConfig,
    pub(crate) coalesce_misses: bool,
    pub(crate) revalidate_on_hit: bool,
}

impl ProxyContext {
    pub fn new(cfg: &StashConfig, cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            resolver: TargetResolver::new(&cfg.proxy),
            origin: OriginClient::new(&cfg.http),
            http: cfg.http.clone(),
            coalesce_misses: cfg.cache.coalesce_misses(),
            revalidate_on_hit: cfg.cache.revalidate_on_hit(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }
}
