// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::providers::{rss::RssScraper, youtube, youtube::YouTubeScraper};
use super::types::{Feed, Scraper};

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub name: String,
    pub url: String,
}

/// A group of RSS feeds sharing one `source_name` label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssGroup {
    pub label: String,
    #[serde(default = "default_rss_limit")]
    pub per_feed_limit: usize,
    pub feeds: Vec<FeedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YouTubeChannel {
    pub name: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YouTubeGroup {
    #[serde(default = "default_youtube_limit")]
    pub per_feed_limit: usize,
    pub channels: Vec<YouTubeChannel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub rss: Vec<RssGroup>,
    #[serde(default)]
    pub youtube: Option<YouTubeGroup>,
}

fn default_rss_limit() -> usize {
    10
}

fn default_youtube_limit() -> usize {
    3
}

fn feed(name: &str, url: &str) -> FeedEntry {
    FeedEntry {
        name: name.to_string(),
        url: url.to_string(),
    }
}

fn channel(name: &str, id: &str) -> YouTubeChannel {
    YouTubeChannel {
        name: name.to_string(),
        channel_id: id.to_string(),
    }
}

impl SourcesConfig {
    /// Built-in feed list used when no sources file exists.
    pub fn default_seed() -> Self {
        Self {
            rss: vec![
                RssGroup {
                    label: "Blog".into(),
                    per_feed_limit: 10,
                    feeds: vec![
                        feed("The Verge", "https://www.theverge.com/rss/index.xml"),
                        feed("Hacker News", "https://news.ycombinator.com/rss"),
                        feed("Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
                    ],
                },
                RssGroup {
                    label: "Newsletter".into(),
                    per_feed_limit: 5,
                    feeds: vec![
                        feed("The Pragmatic Engineer", "https://newsletter.pragmaticengineer.com/feed"),
                        feed("The Batch", "https://www.deeplearning.ai/the-batch/feed/"),
                        feed("TLDR AI", "https://tldr.tech/ai/rss"),
                        feed("Import AI", "https://jack-clark.net/feed/"),
                    ],
                },
            ],
            youtube: Some(YouTubeGroup {
                per_feed_limit: 3,
                channels: vec![
                    channel("Fireship", "UCsBjURrPoezykLs9EqgamOA"),
                    channel("Two Minute Papers", "UCbfYPyITQ-7l4upoX8nvctg"),
                    channel("AI Explained", "UCNJ1Ymd5yFuUPfJ3i6rA5Qw"),
                    channel("Lex Clips", "UCs1bZ6n6Rz9YxN4rU8nJZ5Q"),
                ],
            }),
        }
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_sources(&content, ext.as_str())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `path` if it exists, otherwise the built-in seed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!(target: "ingest", path = %path.display(), "sources file missing, using built-in feeds");
            Ok(Self::default_seed())
        }
    }

    pub fn validate(&self) -> Result<()> {
        for g in &self.rss {
            if g.label.trim().is_empty() {
                bail!("rss group with empty label");
            }
            if g.per_feed_limit < 1 {
                bail!("rss group {:?}: per_feed_limit must be >= 1", g.label);
            }
            if let Some(f) = g.feeds.iter().find(|f| f.url.trim().is_empty()) {
                bail!("rss group {:?}: feed {:?} has empty url", g.label, f.name);
            }
        }
        if let Some(y) = &self.youtube {
            if y.per_feed_limit < 1 {
                bail!("youtube: per_feed_limit must be >= 1");
            }
            if let Some(c) = y.channels.iter().find(|c| c.channel_id.trim().is_empty()) {
                bail!("youtube channel {:?} has empty channel_id", c.name);
            }
        }
        Ok(())
    }

    /// One scraper per RSS group plus one for YouTube (if configured).
    pub fn build_scrapers(&self) -> Vec<Arc<dyn Scraper>> {
        let mut out: Vec<Arc<dyn Scraper>> = Vec::new();
        for g in &self.rss {
            let feeds = g
                .feeds
                .iter()
                .map(|f| Feed::http(f.name.clone(), f.url.trim()))
                .collect();
            out.push(Arc::new(RssScraper::new(g.label.clone(), feeds, g.per_feed_limit)));
        }
        if let Some(y) = &self.youtube {
            let feeds = y
                .channels
                .iter()
                .map(|c| Feed::http(c.name.clone(), youtube::channel_feed_url(c.channel_id.trim())))
                .collect();
            out.push(Arc::new(YouTubeScraper::new(feeds, y.per_feed_limit)));
        }
        out
    }
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<SourcesConfig> {
    match hint_ext {
        "toml" => toml::from_str(s).context("parsing sources toml"),
        "json" => serde_json::from_str(s).context("parsing sources json"),
        _ => toml::from_str(s)
            .or_else(|_| serde_json::from_str(s))
            .map_err(|_| anyhow!("unsupported sources format")),
    }
}
