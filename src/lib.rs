// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod ai;
pub mod config;
pub mod deliver;
pub mod digest;
pub mod ingest;
pub mod maintenance;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod rank;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod topics;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::digest::{BuildOutcome, BuildReport, DigestBuilder};
pub use crate::orchestrator::{DailyOrchestrator, RunReport};
pub use crate::topics::{Topic, TopicTable};

/// Wire every collaborator from settings: topics, generator, gateway,
/// scrapers, builder, transport and dispatcher.
pub fn build_orchestrator(settings: &Settings, store: store::DynStore) -> Result<DailyOrchestrator> {
    let topics = Arc::new(
        TopicTable::load_or_default(&settings.topics_path)
            .with_context(|| format!("loading topics from {}", settings.topics_path))?,
    );
    let generator = ai::build_generator(&settings.ai, settings.enrichment.request_timeout())?;
    let gateway = Arc::new(ai::EnrichmentGateway::new(generator, topics, &settings.enrichment));

    let sources = ingest::config::SourcesConfig::load_or_default(Path::new(&settings.sources_path))?;
    let scrapers = sources.build_scrapers();

    let builder = DigestBuilder::new(store.clone(), gateway, digest::BuilderSettings::from(settings));
    let dispatcher = deliver::DeliveryDispatcher::new(
        store.clone(),
        Arc::new(notify::template::HtmlTemplate::default()),
        notify::build_transport(&settings.email)?,
        settings.email.subject.clone(),
        settings.email.send_timeout(),
    );

    Ok(DailyOrchestrator::new(
        store,
        scrapers,
        settings.ingest_concurrency,
        builder,
        dispatcher,
    ))
}
