//! Chat Relay
//!
//! A conversational chat client and the stateless GraphQL relay it talks to.
//! The client keeps a persisted list of conversations, shows a placeholder
//! while a reply is pending and rolls the placeholder back on failure or
//! cancellation.
//!
//! # Architecture
//!
//! - **Session**: conversation state, optimistic send and rollback
//! - **Transport**: cancellable GraphQL calls to the relay
//! - **Storage**: best-effort key/value persistence of the history
//! - **Relay**: Axum + async-graphql server forwarding to a language model
//! - **UI**: line-oriented terminal client
//!
//! # Modules
//!
//! - [`session`]: conversation and session management
//! - [`transport`]: message transport trait and GraphQL implementation
//! - [`storage`]: local persistence adapter
//! - [`relay`]: GraphQL schema
//! - [`llm`]: language-model backends
//! - [`server`]: HTTP server wiring

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod llm;
pub mod relay;
pub mod server;
pub mod session;
pub mod storage;
pub mod transport;
pub mod ui;

use crate::config::AppConfig;
use crate::relay::RelaySchema;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// GraphQL schema with the language-model backend attached.
    pub schema: RelaySchema,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
