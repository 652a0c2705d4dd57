//! Rewrite stored user interests to canonical topic ids.

use anyhow::{Context, Result};
use knowledge_digest::maintenance::canonicalize_interests;
use knowledge_digest::store::SqliteStore;
use knowledge_digest::{telemetry, Settings, TopicTable};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let settings = Settings::load()?;
    let topics = TopicTable::load_or_default(&settings.topics_path)
        .with_context(|| format!("loading topics from {}", settings.topics_path))?;
    let store = SqliteStore::open(&settings.database_path).await?;

    let report = canonicalize_interests(&store, &topics).await?;
    println!("updated interests for {} users ({} unchanged)", report.updated, report.unchanged);
    Ok(())
}
