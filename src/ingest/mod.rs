// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::models::RawItem;
use crate::store::Store;
pub use types::{Feed, FeedSource, Scraper};

/// Decode entities, strip tags, normalize quotes, collapse whitespace.
pub fn clean_content(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z!][^>]*>").expect("valid regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    out = re_ws.replace_all(&out, " ").to_string();

    // Tag removal leaves a space before punctuation ("<b>x</b>." -> "x .").
    static RE_SP_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re_sp = RE_SP_PUNCT.get_or_init(|| Regex::new(r" ([.,!?;:])").expect("valid regex"));
    out = re_sp.replace_all(&out, "$1").to_string();

    out.trim().to_string()
}

/// Trim url/title, drop items missing either, drop urls already in `seen`.
pub fn prepare_batch(items: Vec<RawItem>, seen: &mut HashSet<String>) -> (Vec<RawItem>, usize) {
    let mut dropped = 0usize;
    let mut keep = Vec::with_capacity(items.len());
    for mut it in items {
        it.url = it.url.trim().to_string();
        it.title = it.title.trim().to_string();
        if it.url.is_empty() || it.title.is_empty() || !seen.insert(it.url.clone()) {
            dropped += 1;
            continue;
        }
        keep.push(it);
    }
    (keep, dropped)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub fetched: usize,
    pub inserted: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub sources: Vec<SourceReport>,
}

impl IngestReport {
    pub fn inserted(&self) -> usize {
        self.sources.iter().map(|s| s.inserted).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Run every scraper (bounded concurrency), then persist prepared items.
/// Scrape and store failures are recorded on the failing source only.
pub async fn run_ingestion(
    scrapers: &[Arc<dyn Scraper>],
    store: &dyn Store,
    concurrency: usize,
) -> IngestReport {
    crate::telemetry::ensure_metrics_described();

    let futs: Vec<BoxFuture<'static, (usize, String, Result<Vec<RawItem>>)>> = scrapers
        .iter()
        .cloned()
        .enumerate()
        .map(|(idx, s)| -> BoxFuture<'static, _> {
            Box::pin(async move { (idx, s.name().to_string(), s.scrape().await) })
        })
        .collect();
    let mut results: Vec<_> = stream::iter(futs)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut seen = HashSet::new();
    let mut report = IngestReport::default();
    for (_, name, res) in results {
        let mut sr = SourceReport {
            name,
            ..Default::default()
        };
        let items = match res {
            Ok(items) => items,
            Err(e) => {
                counter!("ingest_source_errors_total").increment(1);
                tracing::warn!(target: "ingest", source = %sr.name, error = ?e, "scraper failed");
                sr.error = Some(format!("{e:#}"));
                report.sources.push(sr);
                continue;
            }
        };
        sr.fetched = items.len();
        let (batch, dropped) = prepare_batch(items, &mut seen);
        if dropped > 0 {
            tracing::debug!(target: "ingest", source = %sr.name, dropped, "dropped empty or duplicate items");
        }
        match store.insert_raw_items(batch).await {
            Ok(n) => {
                sr.inserted = n;
                counter!("ingest_inserted_total").increment(n as u64);
                tracing::info!(target: "ingest", source = %sr.name, fetched = sr.fetched, inserted = n, "source ingested");
            }
            Err(e) => {
                counter!("ingest_source_errors_total").increment(1);
                tracing::error!(target: "ingest", source = %sr.name, error = ?e, "persisting source items failed");
                sr.error = Some(format!("{e:#}"));
            }
        }
        report.sources.push(sr);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str, url: &str) -> RawItem {
        RawItem {
            title: title.into(),
            url: url.into(),
            content: String::new(),
            published_at: Utc::now(),
            source_name: "Blog".into(),
        }
    }

    #[test]
    fn clean_content_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b>.</p>\n\n “quoted” ";
        assert_eq!(clean_content(s), "Hello, world. \"quoted\"");
    }

    #[test]
    fn clean_content_keeps_comparisons() {
        assert_eq!(clean_content("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn prepare_drops_empty_and_duplicates() {
        let mut seen = HashSet::new();
        let (kept, dropped) = prepare_batch(
            vec![
                item("A", "https://x/a"),
                item("", "https://x/b"),
                item("C", "  "),
                item("A again", " https://x/a "),
                item("D", "https://x/d"),
            ],
            &mut seen,
        );
        assert_eq!(dropped, 3);
        assert_eq!(
            kept.iter().map(|i| i.url.as_str()).collect::<Vec<_>>(),
            vec!["https://x/a", "https://x/d"]
        );
        let (kept2, _) = prepare_batch(vec![item("D", "https://x/d")], &mut seen);
        assert!(kept2.is_empty());
    }
}
