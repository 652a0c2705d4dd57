//! # Topics
//!
//! Closed set of canonical topics plus the alias table that maps free-text
//! labels (model output, user interests) onto them.
//!
//! - Case-insensitive, trimmed exact matching against ids and aliases.
//! - Anything unrecognized normalizes to [`Topic::General`].
//! - Interest expansion keeps the raw lower-cased interest *and* its
//!   canonical id: the ranker matches on raw substrings, the soft filter on
//!   canonical ids.
//! - Built once at startup (`default_seed()` or `config/topics.toml`) and
//!   shared by `Arc`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_TOPICS_CONFIG_PATH: &str = "config/topics.toml";

/// Canonical topic ids. Serialized as lower-case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Ai,
    Mlops,
    Startup,
    Product,
    Vc,
    General,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::Ai,
        Topic::Mlops,
        Topic::Startup,
        Topic::Product,
        Topic::Vc,
        Topic::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Ai => "ai",
            Topic::Mlops => "mlops",
            Topic::Startup => "startup",
            Topic::Product => "product",
            Topic::Vc => "vc",
            Topic::General => "general",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = anyhow::Error;

    /// Strict parse of a canonical id (no aliases).
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| anyhow!("unknown canonical topic: {s}"))
    }
}

/// Alias table: canonical topic → aliases (stored lower-cased, trimmed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTable {
    aliases: BTreeMap<Topic, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TopicsFile {
    #[serde(default)]
    aliases: BTreeMap<String, Vec<String>>,
}

impl TopicTable {
    /// Built-in table used when no config file is present.
    pub fn default_seed() -> Self {
        let mut aliases = BTreeMap::new();
        for (topic, list) in [
            (
                Topic::Ai,
                &[
                    "ai",
                    "artificial intelligence",
                    "llm",
                    "llms",
                    "chatgpt",
                    "machine learning",
                    "deep learning",
                ][..],
            ),
            (
                Topic::Mlops,
                &[
                    "mlops",
                    "devops",
                    "cloud",
                    "infrastructure",
                    "deployment",
                    "pipelines",
                    "aws",
                    "gcp",
                    "azure",
                ][..],
            ),
            (
                Topic::Startup,
                &[
                    "startup",
                    "startups",
                    "business",
                    "founder",
                    "saas",
                    "entrepreneurship",
                ][..],
            ),
            (
                Topic::Product,
                &["product", "pm", "ux", "design", "product management"][..],
            ),
            (
                Topic::Vc,
                &["vc", "venture capital", "investment", "funding"][..],
            ),
            (Topic::General, &[][..]),
        ] {
            aliases.insert(topic, list.iter().map(|s| s.to_string()).collect());
        }
        Self { aliases }
    }

    /// Parse a TOML table of the form `[aliases] ai = ["llm", ...]`.
    /// Topics missing from the file keep their built-in aliases; unknown ids are rejected.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: TopicsFile = toml::from_str(s).context("parsing topics toml")?;
        let mut table = Self::default_seed();
        for (key, list) in file.aliases {
            let topic: Topic = key.parse()?;
            let cleaned: Vec<String> = list
                .iter()
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            table.aliases.insert(topic, cleaned);
        }
        Ok(table)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading topics from {}", path.display()))?;
        Self::from_toml_str(&s)
    }

    /// Load from `path` if it exists, otherwise fall back to the built-in seed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no topics config, using built-in table");
            Ok(Self::default_seed())
        }
    }

    /// Exact match on canonical id or alias; `None` if nothing matches.
    pub fn lookup(&self, raw: &str) -> Option<Topic> {
        let key = raw.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.aliases
            .iter()
            .find(|(topic, list)| topic.as_str() == key || list.iter().any(|a| *a == key))
            .map(|(topic, _)| *topic)
    }

    /// Total mapping: unmatched (or empty) input is `general`.
    pub fn normalize(&self, raw: &str) -> Topic {
        self.lookup(raw).unwrap_or(Topic::General)
    }

    /// Raw lower-cased interests plus the canonical ids they map to.
    pub fn expand_interests<S: AsRef<str>>(&self, interests: &[S]) -> BTreeSet<String> {
        let mut expanded = BTreeSet::new();
        for interest in interests {
            let key = interest.as_ref().trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if let Some(topic) = self.lookup(&key) {
                expanded.insert(topic.as_str().to_string());
            }
            expanded.insert(key);
        }
        expanded
    }

    /// Distinct canonical ids of the interests that map, in first-seen order.
    pub fn canonicalize_interests<S: AsRef<str>>(&self, interests: &[S]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for interest in interests {
            if let Some(topic) = self.lookup(interest.as_ref()) {
                if seen.insert(topic) {
                    out.push(topic.as_str().to_string());
                }
            }
        }
        out
    }

    pub fn aliases_for(&self, topic: Topic) -> &[String] {
        self.aliases.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for TopicTable {
    fn default() -> Self {
        Self::default_seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_variants_normalize_to_ai() {
        let t = TopicTable::default_seed();
        assert_eq!(t.normalize("LLM"), Topic::Ai);
        assert_eq!(t.normalize("llm"), Topic::Ai);
        assert_eq!(t.normalize("  ChatGPT "), Topic::Ai);
        assert_eq!(t.normalize("ai"), Topic::Ai);
    }

    #[test]
    fn unknown_and_empty_are_general() {
        let t = TopicTable::default_seed();
        assert_eq!(t.normalize("quantum knitting"), Topic::General);
        assert_eq!(t.normalize(""), Topic::General);
        assert_eq!(t.normalize("General"), Topic::General);
        assert_eq!(t.lookup("quantum knitting"), None);
    }

    #[test]
    fn expansion_keeps_raw_and_canonical() {
        let t = TopicTable::default_seed();
        let e = t.expand_interests(&["LLMs", "MLOps", "Rust"]);
        assert!(e.contains("llms"));
        assert!(e.contains("ai"));
        assert!(e.contains("mlops"));
        assert!(e.contains("rust"));
        assert!(!e.contains("general"));
        assert_eq!(e.len(), 4);
    }

    #[test]
    fn canonicalize_dedups_in_order() {
        let t = TopicTable::default_seed();
        let c = t.canonicalize_interests(&["Startups", "LLMs", "AI", "knitting"]);
        assert_eq!(c, vec!["startup".to_string(), "ai".to_string()]);
    }

    #[test]
    fn toml_overrides_aliases_and_rejects_unknown_ids() {
        let t = TopicTable::from_toml_str(
            r#"
            [aliases]
            ai = [" Transformers ", "GPT", ""]
            "#,
        )
        .unwrap();
        assert_eq!(t.normalize("gpt"), Topic::Ai);
        assert_eq!(t.normalize("transformers"), Topic::Ai);
        // replaced, so the old alias is gone
        assert_eq!(t.normalize("chatgpt"), Topic::General);
        // untouched topics keep their seed
        assert_eq!(t.normalize("funding"), Topic::Vc);

        let err = TopicTable::from_toml_str("[aliases]\nrobotics = [\"ros\"]").unwrap_err();
        assert!(err.to_string().contains("robotics"));
    }

    #[test]
    fn topic_roundtrips_through_str() {
        for t in Topic::ALL {
            assert_eq!(t.as_str().parse::<Topic>().unwrap(), t);
        }
    }
}
