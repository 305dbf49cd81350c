//! Chat Relay
//!
//! `chat-relay serve` runs the GraphQL relay, `chat-relay chat` opens the
//! terminal client against a running relay.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use chat_relay::config::{AppConfig, Cli, Command};
use chat_relay::session::ChatSession;
use chat_relay::storage::{FileStore, LocalStorage};
use chat_relay::transport::{GraphqlTransport, MessageTransport};
use chat_relay::ui::ChatRepl;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::from_cli(&cli)?);

    init_tracing(config.log_json);

    match cli.command.unwrap_or_default() {
        Command::Serve => chat_relay::server::start_server(config).await,
        Command::Chat => run_chat(&config).await,
    }
}

// Initialize tracing (M-LOG-STRUCTURED); logs go to stderr.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run_chat(config: &AppConfig) -> anyhow::Result<()> {
    let client = &config.client;

    let relay = Arc::new(GraphqlTransport::new(
        &client.endpoint,
        Duration::from_secs(client.request_timeout_secs),
    )?);

    if !relay.check_connection().await {
        tracing::warn!(
            name: "client.relay.unreachable",
            endpoint = %relay.endpoint(),
            "Relay did not answer the health check; messages will fail until it is up"
        );
    }

    let storage = LocalStorage::new(Arc::new(FileStore::new(&client.storage_dir)));
    let handle: Arc<GraphqlTransport> = Arc::clone(&relay);
    let transport: Arc<dyn MessageTransport> = handle;
    let session = ChatSession::with_storage_key(transport, storage, client.storage_key.as_str());

    info!(
        name: "client.started",
        endpoint = %relay.endpoint(),
        storage_dir = %client.storage_dir.display(),
        conversations = session.conversations().len(),
        "Chat client started"
    );

    ChatRepl::new(session, relay).run().await
}
