// src/ingest/providers/youtube.rs
//! YouTube channel scraper over the public Atom `videos.xml` feed.
//! The video description stands in for a transcript.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{collect_feeds, parse_rfc3339_or_now, scrub_html_entities_for_xml};
use crate::ingest::clean_content;
use crate::ingest::types::{Feed, Scraper};
use crate::models::RawItem;

pub const SOURCE_NAME: &str = "YouTube";

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}
#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    published: Option<String>,
    #[serde(rename = "yt:videoId", alias = "videoId")]
    video_id: Option<String>,
    #[serde(rename = "media:group", alias = "group")]
    group: Option<MediaGroup>,
}
#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}
#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "media:description", alias = "description")]
    description: Option<String>,
}

/// Channel feed url for a channel id.
pub fn channel_feed_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}")
}

pub struct YouTubeScraper {
    feeds: Vec<Feed>,
    per_feed_limit: usize,
    client: reqwest::Client,
}

impl YouTubeScraper {
    pub fn new(feeds: Vec<Feed>, per_feed_limit: usize) -> Self {
        Self {
            feeds,
            per_feed_limit,
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn parse_items_from_str(s: &str) -> Result<Vec<RawItem>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let feed: AtomFeed = from_str(&xml_clean).context("parsing youtube atom xml")?;

        let mut out = Vec::with_capacity(feed.entries.len());
        for e in feed.entries {
            let title = e.title.as_deref().map(clean_content).unwrap_or_default();
            let url = e
                .links
                .iter()
                .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
                .and_then(|l| l.href.clone())
                .or_else(|| {
                    e.video_id
                        .as_deref()
                        .map(|id| format!("https://www.youtube.com/watch?v={}", id.trim()))
                })
                .unwrap_or_default();
            let description = e
                .group
                .as_ref()
                .and_then(|g| g.description.as_deref())
                .map(clean_content)
                .filter(|d| !d.is_empty());
            out.push(RawItem {
                content: description.unwrap_or_else(|| title.clone()),
                title,
                url,
                published_at: parse_rfc3339_or_now(e.published.as_deref()),
                source_name: SOURCE_NAME.to_string(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl Scraper for YouTubeScraper {
    async fn scrape(&self) -> Result<Vec<RawItem>> {
        let items = collect_feeds(
            SOURCE_NAME,
            &self.client,
            &self.feeds,
            self.per_feed_limit,
            Self::parse_items_from_str,
        )
        .await?;
        counter!("ingest_items_total").increment(items.len() as u64);
        tracing::info!(target: "ingest", scraper = SOURCE_NAME, items = items.len(), "youtube scrape done");
        Ok(items)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
  <title>Some Channel</title>
  <entry>
    <id>yt:video:abc123</id>
    <yt:videoId>abc123</yt:videoId>
    <title>GPT in 100 seconds</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=abc123"/>
    <published>2025-01-07T12:00:00+00:00</published>
    <media:group>
      <media:title>GPT in 100 seconds</media:title>
      <media:description>A quick tour of LLMs.</media:description>
    </media:group>
  </entry>
  <entry>
    <yt:videoId>def456</yt:videoId>
    <title>No description</title>
    <published>2025-01-06T12:00:00+00:00</published>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_with_description_or_title_fallback() {
        let items = YouTubeScraper::parse_items_from_str(XML).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(items[0].content, "A quick tour of LLMs.");
        assert_eq!(items[1].url, "https://www.youtube.com/watch?v=def456");
        assert_eq!(items[1].content, "No description");
        assert_eq!(items[1].source_name, "YouTube");
    }

    #[test]
    fn feed_url_uses_channel_id() {
        assert!(channel_feed_url("UC123").ends_with("channel_id=UC123"));
    }
}
