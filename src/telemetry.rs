// src/telemetry.rs
//! Tracing subscriber, metric descriptions and the optional Prometheus listener.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` filter (default `info`); JSON lines when `LOG_FORMAT=json`.
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items parsed from scrapers.");
        describe_counter!("ingest_inserted_total", "Items persisted as new articles.");
        describe_counter!("ingest_source_errors_total", "Scraper or feed fetch/parse errors.");
        describe_counter!("enrich_attempts_total", "Model calls made for article enrichment.");
        describe_counter!("enrich_fallbacks_total", "Enrichments resolved to the deterministic fallback.");
        describe_counter!("digests_created_total", "Digests committed.");
        describe_counter!("digest_build_errors_total", "Per-user digest build errors.");
        describe_counter!("delivery_sent_total", "Digests sent and marked delivered.");
        describe_counter!("delivery_failed_total", "Digest sends that failed or timed out.");
        describe_gauge!("daily_run_last_ts", "Unix ts when the daily job last ran.");
    });
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
/// Must run inside a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("installing prometheus exporter on {addr}"))?;
    ensure_metrics_described();
    tracing::info!(%addr, "prometheus listener started");
    Ok(())
}
