// src/ingest/providers/mod.rs
pub mod rss;
pub mod youtube;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{Feed, FeedSource};
use crate::models::RawItem;

async fn fetch_body(client: &reqwest::Client, source: &FeedSource) -> Result<String> {
    match source {
        FeedSource::Fixture(s) => Ok(s.clone()),
        FeedSource::Http { url } => client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} status"))?
            .text()
            .await
            .with_context(|| format!("GET {url} body")),
    }
}

/// Fetch and parse every feed, keeping at most `limit` items each.
/// A failing feed is logged and skipped; the call errors only when all feeds fail.
pub(crate) async fn collect_feeds<F>(
    scraper: &str,
    client: &reqwest::Client,
    feeds: &[Feed],
    limit: usize,
    parse: F,
) -> Result<Vec<RawItem>>
where
    F: Fn(&str) -> Result<Vec<RawItem>>,
{
    let mut out = Vec::new();
    let mut failures = 0usize;
    for feed in feeds {
        let parsed = match fetch_body(client, &feed.source).await {
            Ok(body) => parse(&body),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(items) => {
                let n = items.len().min(limit);
                tracing::debug!(target: "ingest", scraper, feed = %feed.name, items = n, "feed parsed");
                out.extend(items.into_iter().take(limit));
            }
            Err(e) => {
                failures += 1;
                counter!("ingest_source_errors_total").increment(1);
                tracing::warn!(target: "ingest", scraper, feed = %feed.name, error = ?e, "feed error");
            }
        }
    }
    if !feeds.is_empty() && failures == feeds.len() {
        return Err(anyhow!("{scraper}: all {failures} feeds failed"));
    }
    Ok(out)
}

fn to_chrono(odt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(odt.unix_timestamp(), 0)
}

/// RSS `pubDate`; missing or unparsable falls back to now.
pub(crate) fn parse_rfc2822_or_now(ts: Option<&str>) -> DateTime<Utc> {
    ts.and_then(|s| OffsetDateTime::parse(s.trim(), &Rfc2822).ok())
        .and_then(to_chrono)
        .unwrap_or_else(Utc::now)
}

/// Atom `published`; missing or unparsable falls back to now.
pub(crate) fn parse_rfc3339_or_now(ts: Option<&str>) -> DateTime<Utc> {
    ts.and_then(|s| OffsetDateTime::parse(s.trim(), &Rfc3339).ok())
        .and_then(to_chrono)
        .unwrap_or_else(Utc::now)
}

/// Replace HTML named entities that are not valid XML before deserializing.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_or_fall_back() {
        let d = parse_rfc2822_or_now(Some("Tue, 07 Jan 2025 10:00:00 +0000"));
        assert_eq!(d.to_rfc3339(), "2025-01-07T10:00:00+00:00");
        let d = parse_rfc3339_or_now(Some("2025-01-07T12:00:00+02:00"));
        assert_eq!(d.to_rfc3339(), "2025-01-07T10:00:00+00:00");

        let before = Utc::now();
        assert!(parse_rfc2822_or_now(Some("not a date")) >= before);
        assert!(parse_rfc3339_or_now(None) >= before);
    }

    #[tokio::test]
    async fn errors_only_when_every_feed_fails() {
        let client = reqwest::Client::new();
        let ok_parse = |s: &str| -> Result<Vec<RawItem>> {
            if s == "bad" {
                anyhow::bail!("broken feed");
            }
            Ok(vec![RawItem {
                title: "t".into(),
                url: s.into(),
                content: String::new(),
                published_at: Utc::now(),
                source_name: "Blog".into(),
            }])
        };
        let mixed = vec![Feed::fixture("a", "bad"), Feed::fixture("b", "u1")];
        let items = collect_feeds("test", &client, &mixed, 10, ok_parse).await.unwrap();
        assert_eq!(items.len(), 1);

        let all_bad = vec![Feed::fixture("a", "bad"), Feed::fixture("b", "bad")];
        assert!(collect_feeds("test", &client, &all_bad, 10, ok_parse).await.is_err());
    }
}
