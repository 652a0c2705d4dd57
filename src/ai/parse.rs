// src/ai/parse.rs
//! Model output validation and deterministic fallbacks.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::models::Enrichment;
use crate::topics::{Topic, TopicTable};

pub const FILLER_TAKEAWAY: &str = "Important insight from the article";
pub const FALLBACK_SUMMARY: &str = "Key insights from today's article.";
pub const FALLBACK_TAKEAWAYS: [&str; 3] = [
    "Important development highlighted",
    "Key implications discussed",
    "Future trends indicated",
];
const FALLBACK_SUMMARY_MAX_CHARS: usize = 150;

fn fence_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z]*").expect("fence regex"))
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[.!?]").expect("sentence regex"))
}

/// Remove markdown code fences (```json ... ```).
pub fn strip_fences(text: &str) -> String {
    fence_re().replace_all(text, "").trim().to_string()
}

/// Parse the whole text as a JSON object, else the outermost `{...}` fragment.
fn locate_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let cleaned = strip_fences(text);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
        return Some(map);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Validate model output.
///
/// Returns `None` when the output is unusable (no JSON object or an empty summary).
/// Otherwise takeaways are padded/truncated to three and the topic is normalized.
pub fn parse_enrichment(text: &str, topics: &TopicTable) -> Option<Enrichment> {
    let map = locate_object(text)?;

    let summary = map
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if summary.is_empty() {
        return None;
    }

    let mut takeaways: Vec<String> = match map.get("takeaways") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .take(3)
            .collect(),
        _ => Vec::new(),
    };
    while takeaways.len() < 3 {
        takeaways.push(FILLER_TAKEAWAY.to_string());
    }
    let takeaways: [String; 3] = takeaways.try_into().ok()?;

    let topic = map
        .get("topic")
        .and_then(Value::as_str)
        .map(|t| topics.normalize(t))
        .unwrap_or(Topic::General);

    Some(Enrichment {
        summary,
        takeaways,
        topic,
    })
}

/// First sentence of `content`, bounded; generic takeaways; `general` topic.
pub fn fallback_enrichment(content: &str) -> Enrichment {
    let first = sentence_end_re()
        .split(content)
        .next()
        .unwrap_or_default()
        .trim();
    let summary: String = first.chars().take(FALLBACK_SUMMARY_MAX_CHARS).collect();
    let summary = summary.trim().to_string();

    Enrichment {
        summary: if summary.is_empty() {
            FALLBACK_SUMMARY.to_string()
        } else {
            summary
        },
        takeaways: FALLBACK_TAKEAWAYS.map(str::to_string),
        topic: Topic::General,
    }
}

/// Truncate to at most `limit` chars, appending "..." when cut.
pub fn truncate_content(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
