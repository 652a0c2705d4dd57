// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_OPENROUTER_MODEL: &str = "OPENROUTER_MODEL";

fn default_provider() -> String {
    "openrouter".to_string()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_api_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// "openrouter" | "disabled" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENROUTER_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            api_url: default_api_url(),
        }
    }
}

impl AiConfig {
    /// Normalize provider, apply env overrides and resolve an "ENV" key.
    /// A missing key is not an error: it just leaves the generator unconfigured.
    pub fn resolve(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();

        if let Ok(model) = env::var(ENV_OPENROUTER_MODEL) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(ENV_OPENROUTER_API_KEY).unwrap_or_default();
        }
        self.api_key = self.api_key.trim().to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled" && !self.api_key.is_empty()
    }
}
