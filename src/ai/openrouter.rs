use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, TextGenerator};
use crate::config::ai::AiConfig;

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter chat-completions client (OpenAI-compatible wire format).
pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(config: &AiConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("knowledge-digest/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: req.system,
                },
                Msg {
                    role: "user",
                    content: req.user,
                },
            ],
            max_tokens: req.max_tokens,
            temperature: 0.3,
            response_format: req.structured.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Knowledge Digest")
            .json(&body)
            .send()
            .await
            .context("openrouter request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("openrouter HTTP {status}: {}", truncate(&text, 300)));
        }

        let parsed: ChatResponse = resp.json().await.context("openrouter response body")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(anyhow!("openrouter returned empty content"));
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
