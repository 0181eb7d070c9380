use std::sync::Arc;

use lqb_core::{
    config::Config,
    memory::{MemoryLeadRepository, MemoryLockRepository, MemoryTtlStore},
};

#[tokio::main]
async fn main() -> Result<(), lqb_core::Error> {
    lqb_core::logging::init("lqb")?;

    let cfg = Arc::new(Config::load()?);

    // Single-node backends. Deployments with durable storage swap these for
    // implementations of the same ports without touching the core.
    let repo = Arc::new(MemoryLeadRepository::new());
    let locks = Arc::new(MemoryLockRepository::new());
    let ttl = Arc::new(MemoryTtlStore::new());

    lqb_telegram::router::run_polling(cfg, repo, locks, ttl)
        .await
        .map_err(|e| lqb_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
