//! Chat-completion client abstraction.
//!
//! Defines the [`ChatModel`] trait and its implementations:
//! - **[`DisabledModel`]**: always errors; callers fall back to canned content.
//! - **[`HuggingFaceModel`]**: calls an OpenAI-compatible `chat/completions`
//!   endpoint (the Hugging Face router by default).
//!
//! Requests are never streamed and are bounded by `llm.timeout_secs`. There is
//! no retry: a failed call is reported to the caller, which degrades to static
//! content.
//!
//! # Provider Selection
//!
//! | Config Value | Model |
//! |-------------|-------|
//! | `"disabled"` | [`DisabledModel`] |
//! | `"huggingface"` | [`HuggingFaceModel`] |

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

/// One message of a conversation sent to the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A hosted chat-completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier recorded in message metadata.
    fn model_name(&self) -> &str;

    /// Raw completion text. `Ok(None)` when the provider answered without
    /// any message content.
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>>;
}

// ============ Disabled Model ============

pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Option<String>> {
        bail!("LLM provider is disabled")
    }
}

// ============ Hugging Face Model ============

pub struct HuggingFaceModel {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl HuggingFaceModel {
    /// # Errors
    ///
    /// Fails when `llm.model` is unset or the API key variable is missing.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for huggingface provider"))?;

        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for HuggingFaceModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>> {
        let body = serde_json::json!({
            "messages": request.messages,
            "model": self.model,
            "stream": false,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Hugging Face API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        Ok(parse_completion(&json))
    }
}

/// Extracts `choices[0].message.content` from a chat-completion response.
pub fn parse_completion(json: &serde_json::Value) -> Option<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

/// Create the [`ChatModel`] named by `llm.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "huggingface" => Ok(Arc::new(HuggingFaceModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
