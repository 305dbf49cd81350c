use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<String>,

    /// Port for the relay server to listen on
    #[arg(long, env = "PORT", global = true)]
    pub port: Option<u16>,

    /// Relay base URL used by the chat client
    #[arg(long, env = "RELAY_URL", global = true)]
    pub endpoint: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the GraphQL relay server (default)
    #[default]
    Serve,
    /// Open an interactive chat session against a relay
    Chat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub llm: LlmConfig,
    pub client: ClientConfig,
    #[serde(default)]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Upper bound on one request, in seconds. `0` disables the limit.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Reply used when no `base_url` is configured.
    pub fallback_reply: String,
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-5-nano".to_string(),
            temperature: 1.0,
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            azure_deployment: None,
            azure_api_version: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Relay base URL; `/graphql` is appended.
    pub endpoint: String,
    pub storage_dir: PathBuf,
    pub storage_key: String,
    pub request_timeout_secs: u64,
}

pub const DEFAULT_FALLBACK_REPLY: &str =
    "No language model is configured on this relay. Set LLM_BASE_URL to enable real replies.";

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:5175",
    "http://localhost:3000",
    "https://chatbotfrontend-dhd.pages.dev",
    "https://chat.qincai.digital",
];

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layer defaults, config file, environment and CLI flags.
    ///
    /// Priority: CLI flag > `LLM_*` env > `CHAT_*` env > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(ToString::to_string)
            .collect();
        let defaults = LlmConfig::default();

        // 1. Defaults
        let mut builder = Config::builder()
            .set_default("server.port", 8787)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("cors.allowed_origins", origins)?
            .set_default("llm.model", defaults.model)?
            .set_default("llm.temperature", f64::from(defaults.temperature))?
            .set_default("llm.fallback_reply", defaults.fallback_reply)?
            .set_default("client.endpoint", "http://localhost:8787")?
            .set_default("client.storage_dir", ".chat-relay")?
            .set_default("client.storage_key", "conversations")?
            .set_default("client.request_timeout_secs", 60)?
            .set_default("log_json", false)?;

        // 2. Config file: explicit path must exist, ./config.yaml is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        // 3. Environment variables, e.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        // 4. Conventional LLM variables
        if let Some(val) = non_empty_env("LLM_BASE_URL") {
            builder = builder.set_override("llm.base_url", val)?;
        }
        if let Some(val) = non_empty_env("LLM_MODEL") {
            builder = builder.set_override("llm.model", val)?;
        }
        if let Some(val) = non_empty_env("LLM_API_KEY").or_else(|| non_empty_env("OPENAI_API_KEY"))
        {
            builder = builder.set_override("llm.api_key", val)?;
        }
        if let Some(val) = non_empty_env("AZURE_DEPLOYMENT_NAME") {
            builder = builder.set_override("llm.azure_deployment", val)?;
        }
        if let Some(val) = non_empty_env("AZURE_API_VERSION") {
            builder = builder.set_override("llm.azure_api_version", val)?;
        }

        // 5. CLI overrides (clap already folded in PORT / RELAY_URL / LOG_JSON)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(endpoint) = &cli.endpoint {
            builder = builder.set_override("client.endpoint", endpoint.as_str())?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("log_json", json)?;
        }

        builder.build()?.try_deserialize()
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}
