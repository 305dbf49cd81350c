//! GraphQL schema served by the relay.
//!
//! ```graphql
//! type Query    { health: HealthStatus! }
//! type Mutation { sendMessage(messages: [MessageInput!]!): ChatResponse! }
//! ```
//!
//! The relay keeps no state between requests: every mutation carries the
//! whole conversation and is forwarded to the configured [`LlmBackend`].

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, InputObject, Object, Schema, SimpleObject};
use chrono::{SecondsFormat, Utc};
use tracing::{error, info};

use crate::llm::LlmBackend;
use crate::session::Role;
use crate::transport::WireMessage;

pub type RelaySchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema with `backend` available to resolvers.
#[must_use]
pub fn build_schema(backend: Arc<dyn LlmBackend>) -> RelaySchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(backend)
        .finish()
}

#[derive(SimpleObject, Debug, Clone)]
pub struct HealthStatus {
    pub status: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(InputObject, Debug, Clone)]
pub struct MessageInput {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Forward a conversation to the language model and return its reply.
    async fn send_message(
        &self,
        ctx: &Context<'_>,
        messages: Vec<MessageInput>,
    ) -> async_graphql::Result<ChatResponse> {
        let wire = validate(messages)?;
        let backend = ctx.data::<Arc<dyn LlmBackend>>()?;

        info!(
            name: "relay.message.received",
            message_count = wire.len(),
            "Relaying conversation"
        );

        match backend.complete(&wire).await {
            Ok(content) => Ok(ChatResponse { content }),
            Err(e) => {
                error!(name: "relay.message.failed", error = %e, "sendMessage failed");
                Err(async_graphql::Error::new(e.to_string()))
            }
        }
    }
}

fn validate(messages: Vec<MessageInput>) -> async_graphql::Result<Vec<WireMessage>> {
    if messages.is_empty() {
        return Err("Invalid request: messages array is required".into());
    }

    messages
        .into_iter()
        .map(|m| match Role::parse(&m.role) {
            Some(role) => Ok(WireMessage {
                role,
                content: m.content,
            }),
            None => Err(async_graphql::Error::new(format!(
                "Invalid request: unknown role '{}'",
                m.role
            ))),
        })
        .collect()
}
