use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use super::Master;
use crate::ProxyContext;

impl Master {
    pub(super) fn log_startup(&self) {
        info!(target: "stash::master", "Starting STASH MASTER");
        info!(
            target: "stash::master",
            worker_connections = self.cfg.global.worker_connections,
            log_level = %self.cfg.global.log_level,
            "Global configuration loaded"
        );
        info!(
            target: "stash::master",
            self_address = %self.cfg.proxy.self_address,
            local_origin = %self.cfg.proxy.local_origin(),
            coalesce_misses = self.cfg.cache.coalesce_misses,
            revalidate_on_hit = self.cfg.cache.revalidate_on_hit,
            "Proxy configuration loaded"
        );
    }

    pub(super) fn init_semaphore(&self) -> Arc<Semaphore> {
        let max_conns = self.cfg.global.worker_connections as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(
            target: "stash::master",
            max_conns,
            "Global connection semaphore initialized"
        );
        semaphore
    }

    pub(super) fn build_context(&self) -> Arc<ProxyContext> {
        Arc::new(ProxyContext::new(&self.cfg, self.cache.clone()))
    }
}
