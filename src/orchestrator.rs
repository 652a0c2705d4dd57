// src/orchestrator.rs
//! Daily job: ingestion, then digests, then delivery. Each stage runs even
//! when an earlier one failed; a failed stage is logged and reported as `None`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::gauge;
use tracing::{error, info};

use crate::deliver::{DeliveryDispatcher, DeliveryReport};
use crate::digest::{BuildReport, DigestBuilder};
use crate::ingest::{self, IngestReport, Scraper};
use crate::scheduler::Job;
use crate::store::DynStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub ingest: Option<IngestReport>,
    pub digests: Option<BuildReport>,
    pub delivery: Option<DeliveryReport>,
}

impl RunReport {
    pub fn all_ok(&self) -> bool {
        self.ingest.is_some() && self.digests.is_some() && self.delivery.is_some()
    }
}

pub struct DailyOrchestrator {
    store: DynStore,
    scrapers: Vec<Arc<dyn Scraper>>,
    ingest_concurrency: usize,
    builder: DigestBuilder,
    dispatcher: DeliveryDispatcher,
}

impl DailyOrchestrator {
    pub fn new(
        store: DynStore,
        scrapers: Vec<Arc<dyn Scraper>>,
        ingest_concurrency: usize,
        builder: DigestBuilder,
        dispatcher: DeliveryDispatcher,
    ) -> Self {
        Self {
            store,
            scrapers,
            ingest_concurrency,
            builder,
            dispatcher,
        }
    }

    /// Always `Some`: source failures are recorded in the per-source reports.
    pub async fn run_ingestion(&self) -> Option<IngestReport> {
        let r = ingest::run_ingestion(&self.scrapers, self.store.as_ref(), self.ingest_concurrency).await;
        info!(
            target: "orchestrator",
            sources = r.sources.len(),
            inserted = r.inserted(),
            failed_sources = r.failed_sources(),
            "ingestion stage finished"
        );
        Some(r)
    }

    pub async fn run_digests(&self, now: DateTime<Utc>) -> Option<BuildReport> {
        self.builder
            .build_for_all(now)
            .await
            .map_err(|e| error!(target: "orchestrator", error = ?e, "digest stage failed"))
            .ok()
    }

    pub async fn run_delivery(&self, today: NaiveDate) -> Option<DeliveryReport> {
        self.dispatcher
            .dispatch(today)
            .await
            .map_err(|e| error!(target: "orchestrator", error = ?e, "delivery stage failed"))
            .ok()
    }

    pub async fn run_daily(&self, now: DateTime<Utc>) -> RunReport {
        crate::telemetry::ensure_metrics_described();
        info!(target: "orchestrator", %now, "daily run started");

        let report = RunReport {
            ingest: self.run_ingestion().await,
            digests: self.run_digests(now).await,
            delivery: self.run_delivery(now.date_naive()).await,
        };

        gauge!("daily_run_last_ts").set(now.timestamp() as f64);
        info!(target: "orchestrator", ok = report.all_ok(), ?report, "daily run finished");
        report
    }
}

#[async_trait]
impl Job for DailyOrchestrator {
    async fn run(&self, now: DateTime<Utc>) -> RunReport {
        self.run_daily(now).await
    }
}
