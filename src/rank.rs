//! Relevance ranking: pure, no I/O.
//!
//! Score = number of interests that occur (case-insensitive substring) in
//! `"{title} {content}"`. Sorting is stable, so equal scores keep input order.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::models::Article;

pub fn score(article: &Article, interests: &BTreeSet<String>) -> usize {
    let text = format!("{} {}", article.title, article.content).to_lowercase();
    interests
        .iter()
        .filter(|i| text.contains(i.to_lowercase().as_str()))
        .count()
}

pub fn rank(items: Vec<Article>, interests: &BTreeSet<String>) -> Vec<Article> {
    let mut scored: Vec<(usize, Article)> = items
        .into_iter()
        .map(|a| (score(&a, interests), a))
        .collect();
    // sort_by_key is stable
    scored.sort_by_key(|(s, _)| Reverse(*s));
    scored.into_iter().map(|(_, a)| a).collect()
}
