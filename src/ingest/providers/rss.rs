// src/ingest/providers/rss.rs
//! RSS 2.0 scraper used for blog and newsletter feeds.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{collect_feeds, parse_rfc2822_or_now, scrub_html_entities_for_xml};
use crate::ingest::clean_content;
use crate::ingest::types::{Feed, Scraper};
use crate::models::RawItem;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content_encoded: Option<String>,
}

pub struct RssScraper {
    label: String,
    feeds: Vec<Feed>,
    per_feed_limit: usize,
    client: reqwest::Client,
}

impl RssScraper {
    /// `label` becomes the `source_name` of every item (e.g. "Blog", "Newsletter").
    pub fn new(label: impl Into<String>, feeds: Vec<Feed>, per_feed_limit: usize) -> Self {
        Self {
            label: label.into(),
            feeds,
            per_feed_limit,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub(crate) fn parse_items_from_str(label: &str, s: &str) -> Result<Vec<RawItem>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = it.title.as_deref().map(clean_content).unwrap_or_default();
            let url = it.link.as_deref().map(str::trim).unwrap_or_default().to_string();
            // Full body wins over the teaser.
            let body = it
                .content_encoded
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .or(it.description.as_deref())
                .unwrap_or_default();
            out.push(RawItem {
                title,
                url,
                content: clean_content(body),
                published_at: parse_rfc2822_or_now(it.pub_date.as_deref()),
                source_name: label.to_string(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl Scraper for RssScraper {
    async fn scrape(&self) -> Result<Vec<RawItem>> {
        let label = self.label.as_str();
        let items = collect_feeds(label, &self.client, &self.feeds, self.per_feed_limit, |s| {
            Self::parse_items_from_str(label, s)
        })
        .await?;
        counter!("ingest_items_total").increment(items.len() as u64);
        tracing::info!(target: "ingest", scraper = label, items = items.len(), "rss scrape done");
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.label
    }
}
