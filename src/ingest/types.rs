// src/ingest/types.rs
use anyhow::Result;

use crate::models::RawItem;

/// Where a feed's XML comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// Inline XML (tests, offline runs).
    Fixture(String),
    Http { url: String },
}

/// One feed of a scraper. `name` is only used for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub name: String,
    pub source: FeedSource,
}

impl Feed {
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FeedSource::Http { url: url.into() },
        }
    }

    pub fn fixture(name: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FeedSource::Fixture(xml.into()),
        }
    }
}

#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
}
