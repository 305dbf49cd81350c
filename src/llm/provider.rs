//! Provider-specific configuration and detection.
//!
//! This module handles differences between LLM API providers: URL patterns
//! and how the API key is presented.

/// API version used for Azure deployments when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chat_relay::llm::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://api.openai.com");
    /// assert_eq!(provider, Provider::OpenAI);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL (trailing slash and a repeated API root are ignored)
    /// * `model` - The model name (unused for Azure, which uses deployment name)
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str, _model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => {
                format!(
                    "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
                )
            }
            Self::Groq => {
                let base = strip_api_root(base, "/openai/v1");
                format!("{base}/openai/v1/chat/completions")
            }
            Self::OpenRouter => {
                let base = strip_api_root(base, "/api/v1");
                format!("{base}/api/v1/chat/completions")
            }
            Self::OpenAI | Self::Generic => {
                let base = strip_api_root(base, "/v1");
                format!("{base}/v1/chat/completions")
            }
        }
    }

    /// Attach the API key the way this provider expects it.
    #[must_use]
    pub fn authorize(&self, rb: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        match self {
            Self::AzureOpenAI { .. } => rb.header("api-key", api_key),
            _ => rb.bearer_auth(api_key),
        }
    }
}

/// Base URLs are often copied with the API root already attached.
fn strip_api_root<'a>(base: &'a str, root: &str) -> &'a str {
    base.strip_suffix(root).unwrap_or(base)
}
