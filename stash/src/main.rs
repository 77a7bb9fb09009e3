use stash_config::StashConfig;
use stash_core::master::Master;
use tracing::info;
use utils::init_tracing;

const DEFAULT_CONFIG: &str = "stash.conf";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    // Config problems are reported on stderr, so tracing can wait for the level.
    let cfg = StashConfig::from_file_or_default(&path);
    init_tracing(cfg.global.log_level());
    info!(target: "stash::master", config = %path, "Configuration loaded");
    cfg.print();

    let master = Master::new(cfg);
    master.run().await?;

    Ok(())
}
