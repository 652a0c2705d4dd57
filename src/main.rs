//! Knowledge Digest binary entrypoint.
//! Loads settings, opens the store, wires the daily job and either runs it
//! once (`--once`) or schedules it until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use knowledge_digest::scheduler::DailyScheduler;
use knowledge_digest::store::SqliteStore;
use knowledge_digest::{build_orchestrator, telemetry, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let settings = Settings::load().context("loading settings")?;
    if let Some(addr) = settings.metrics_socket()? {
        telemetry::install_prometheus(addr)?;
    }
    telemetry::ensure_metrics_described();

    let store = SqliteStore::open(&settings.database_path).await?;
    info!(path = %settings.database_path, "store opened");

    let job = Arc::new(build_orchestrator(&settings, Arc::new(store))?);
    let scheduler = DailyScheduler::new(settings.schedule()?, job);

    if std::env::args().skip(1).any(|a| a == "--once") {
        let report = scheduler.run_now().await;
        info!(ok = report.all_ok(), ?report, "single run finished");
        return Ok(());
    }

    info!(at = %settings.digest_generation_time, run_on_start = settings.run_on_start, "scheduler starting (UTC)");
    let handle = scheduler.spawn(settings.run_on_start);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");
    handle.abort();
    Ok(())
}
