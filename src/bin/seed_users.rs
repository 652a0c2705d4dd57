//! Upsert subscribers from a TOML/JSON file, matched by email.
//! Usage: seed-users <users.toml|users.json>

use std::path::PathBuf;

use anyhow::{bail, Result};
use knowledge_digest::maintenance::{load_seed_users, seed_users};
use knowledge_digest::store::SqliteStore;
use knowledge_digest::{telemetry, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: seed-users <users.toml|users.json>");
    };

    let settings = Settings::load()?;
    let users = load_seed_users(&path)?;
    let store = SqliteStore::open(&settings.database_path).await?;
    let n = seed_users(&store, &users).await?;
    tracing::info!(users = n, file = %path.display(), "seeding finished");
    Ok(())
}
