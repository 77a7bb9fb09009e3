use std::sync::Arc;

use stash_cache::CacheManager;
use stash_config::StashConfig;
use tracing::{info, instrument, warn};

mod accept;
mod startup;

use accept::{accept_loop, bind_listener};

/// Owns the listening socket and the process-wide cache.
pub struct Master {
    cfg: Arc<StashConfig>,
    cache: Arc<CacheManager>,
}

impl Master {
    pub fn new(cfg: StashConfig) -> Self {
        Self {
            cfg: Arc::new(cfg),
            cache: Arc::new(CacheManager::new()),
        }
    }

    /// Binds the listener and serves connections until Ctrl+C.
    #[instrument(skip(self), fields(
        listen_port = %self.cfg.proxy.listen_port,
        worker_connections = %self.cfg.global.worker_connections,
        log_level = %self.cfg.global.log_level,
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_startup();

        let semaphore = self.init_semaphore();
        let ctx = self.build_context();

        let listen_addr = self.cfg.proxy.listen_addr();
        let listener = bind_listener(&listen_addr, self.cfg.proxy.backlog)?;

        info!(
            target: "stash::master",
            listen = %listen_addr,
            "Master initialized. Waiting for incoming connections (Ctrl+C to stop)..."
        );

        tokio::select! {
            res = accept_loop(listener, listen_addr.clone(), semaphore, ctx) => {
                warn!(
                    target: "stash::master",
                    listen = %listen_addr,
                    "accept_loop exited"
                );
                res
            }
            _ = tokio::signal::ctrl_c() => {
                info!(
                    target: "stash::master",
                    cached_entries = self.cache.len(),
                    "Shutdown requested"
                );
                Ok(())
            }
        }
    }
}
