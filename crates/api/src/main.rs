//! mtrd - metric ingestion engine daemon
//!
//! Opens the store, runs retention on its cron schedule and waits for
//! Ctrl-C.

use anyhow::{Context, Result};
use mtr_lib::utils::logging::init_tracing;
use mtr_lib::EngineContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let config = mtr_infra::config::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialise logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => info!(error = %e, "no .env loaded"),
    }

    let ctx = EngineContext::new(config).await.context("failed to start engine")?;
    let health = ctx.health().await;
    info!(
        healthy = health.is_healthy,
        score = health.score,
        retention = ctx.retention_running().await,
        "mtrd started"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    if let Err(err) = ctx.shutdown().await {
        warn!(error = %err, "engine did not shut down cleanly");
    }
    let stats = ctx.identities.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        creates = stats.creates,
        evictions = stats.evictions,
        "identity cache totals"
    );
    let pool = ctx.db.pool().metrics();
    info!(
        acquired = pool.connections_acquired,
        timeouts = pool.connections_timeout,
        errors = pool.connections_error,
        avg_acquisition_ms = pool.avg_acquisition_time_ms,
        "connection pool totals"
    );
    Ok(())
}
