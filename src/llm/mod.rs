//! Language-model backends the relay forwards conversations to.
//!
//! # Backends
//!
//! - [`ChatCompletionsBackend`]: `OpenAI`-compatible Chat Completions API
//!   (`/v1/chat/completions`), non-streaming
//! - [`CannedBackend`]: answers every request with a fixed reply; used when no
//!   model endpoint is configured
//!
//! # Example
//!
//! ```rust
//! use chat_relay::config::LlmConfig;
//! use chat_relay::llm::LlmSettings;
//!
//! let cfg = LlmConfig {
//!     base_url: Some("https://api.openai.com".to_string()),
//!     ..LlmConfig::default()
//! };
//! let settings = LlmSettings::from_config(&cfg).unwrap();
//! assert_eq!(settings.model, "gpt-5-nano");
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsBackend;
pub use provider::{DEFAULT_AZURE_API_VERSION, Provider};

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::transport::WireMessage;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-5-nano`).
    pub model: String,
    /// Sampling temperature sent with every request.
    pub temperature: f32,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
}

impl LlmSettings {
    /// Build settings from configuration.
    ///
    /// Returns `None` when no base URL is configured.
    #[must_use]
    pub fn from_config(cfg: &LlmConfig) -> Option<Self> {
        let base_url = cfg
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?
            .to_string();

        // Auto-detect provider from base URL
        let mut provider = Provider::detect_from_url(&base_url);

        // Update provider with Azure deployment info if provided
        if let Provider::AzureOpenAI { .. } = &provider
            && let Some(deployment) = &cfg.azure_deployment
        {
            provider = Provider::AzureOpenAI {
                deployment_name: deployment.clone(),
                api_version: cfg
                    .azure_api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            };
        }

        Some(Self {
            base_url,
            api_key: cfg.api_key.clone().filter(|s| !s.trim().is_empty()),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            provider,
        })
    }
}

/// A model that turns a conversation into one reply.
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync + std::fmt::Debug {
    /// Produce the assistant's reply to `messages`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    async fn complete(&self, messages: &[WireMessage]) -> anyhow::Result<String>;
}

/// Backend answering every request with the same text.
#[derive(Debug, Clone)]
pub struct CannedBackend {
    reply: String,
}

impl CannedBackend {
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait::async_trait]
impl LlmBackend for CannedBackend {
    async fn complete(&self, messages: &[WireMessage]) -> anyhow::Result<String> {
        tracing::debug!(message_count = messages.len(), "Answering with canned reply");
        Ok(self.reply.clone())
    }
}

/// Pick the backend described by `cfg`.
pub fn backend_from_config(cfg: &LlmConfig) -> anyhow::Result<Arc<dyn LlmBackend>> {
    match LlmSettings::from_config(cfg) {
        Some(settings) => {
            tracing::info!(
                name: "llm.config.loaded",
                base_url = %settings.base_url,
                model = %settings.model,
                provider = ?settings.provider,
                "LLM configuration loaded"
            );
            Ok(Arc::new(ChatCompletionsBackend::new(settings)?))
        }
        None => {
            tracing::warn!(
                name: "llm.config.missing",
                "No LLM base URL configured; relay will answer with the fallback reply"
            );
            Ok(Arc::new(CannedBackend::new(cfg.fallback_reply.clone())))
        }
    }
}
