//! Chat-completion client for an OpenAI-compatible endpoint (Ollama, llama.cpp,
//! OpenAI itself). The core consumes this purely as a
//! `complete(messages, model) -> text` capability behind [`ChatClient`], which
//! also gives tests a seam for scripted responses.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;

/// Low temperature keeps structured extraction output consistent.
const TEMPERATURE: f64 = 0.1;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The model capability the core depends on.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String>;
}

/// HTTP client for `POST <base_url>/chat/completions`.
pub struct HttpChatClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            api_key: if config.llm.api_key.is_empty() {
                "not-needed".to_string()
            } else {
                config.llm.api_key.clone()
            },
            http,
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": TEMPERATURE,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Cannot connect to LLM at {}. Is the model server running?",
                    self.base_url
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("LLM API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("");

        if content.is_empty() {
            bail!("Empty response from LLM");
        }

        Ok(content.to_string())
    }
}
