// src/digest/filter.rs
use std::collections::BTreeSet;

use crate::models::Article;

/// Keep articles whose topic id is in `interests`. If none match, fall back to
/// the first `fallback` articles unfiltered. Input order is preserved.
pub fn soft_filter(articles: Vec<Article>, interests: &BTreeSet<String>, fallback: usize) -> Vec<Article> {
    let matched: Vec<Article> = articles
        .iter()
        .filter(|a| a.topic.is_some_and(|t| interests.contains(t.as_str())))
        .cloned()
        .collect();
    if !matched.is_empty() {
        return matched;
    }
    tracing::debug!(target: "digest", candidates = articles.len(), fallback, "no topic match, using fallback set");
    articles.into_iter().take(fallback).collect()
}
