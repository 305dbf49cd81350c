//! `OpenAI` Chat Completions API backend.
//!
//! Sends the whole conversation to `/v1/chat/completions` with streaming off
//! and returns the first choice's message content.

use serde_json::Value;

use crate::transport::WireMessage;

use super::{LlmBackend, LlmSettings};

/// Backend for the `OpenAI` Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsBackend {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsBackend")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsBackend {
    /// Create a backend with the given settings.
    pub fn new(settings: LlmSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, settings })
    }

    /// Chat completions URL for the configured provider.
    #[must_use]
    pub fn url(&self) -> String {
        self.settings
            .provider
            .build_chat_url(&self.settings.base_url, &self.settings.model)
    }
}

#[async_trait::async_trait]
impl LlmBackend for ChatCompletionsBackend {
    async fn complete(&self, messages: &[WireMessage]) -> anyhow::Result<String> {
        let url = self.url();

        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "stream": false,
            "temperature": self.settings.temperature,
        });

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = self.settings.provider.authorize(rb, k);
        }

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            message_count = messages.len(),
            "Calling chat completions"
        );

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %detail, "LLM API error");
            anyhow::bail!("LLM API error: {status}");
        }

        let data: Value = resp.json().await?;
        let content = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        tracing::debug!(content_length = content.len(), "Chat completion received");
        Ok(content)
    }
}
