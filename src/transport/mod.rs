//! Message transport: the boundary between the session manager and the relay.
//!
//! A [`MessageTransport`] turns an ordered list of role/content pairs into one
//! remote call and returns the reply text. Calls take a
//! [`CancellationToken`]; signalling it abandons the call.
//!
//! - [`GraphqlTransport`]: GraphQL over HTTP against the relay service.

mod graphql;

pub use graphql::{GraphqlTransport, HealthStatus};

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::session::Role;

/// Message shape on the wire: role and content only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

/// Transport failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint unreachable or answered with a non-success status.
    #[error("{0}")]
    Network(String),

    /// Response arrived but carried errors or lacked the reply.
    #[error("{0}")]
    Protocol(String),

    /// The caller cancelled the request.
    #[error("Request was cancelled")]
    Cancelled,
}

/// Sends a conversation to a remote model and returns its reply.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync + std::fmt::Debug {
    /// Send `messages` and wait for the reply.
    ///
    /// # Errors
    ///
    /// [`TransportError::Cancelled`] once `cancel` is signalled; network and
    /// protocol failures otherwise.
    async fn send(
        &self,
        messages: &[WireMessage],
        cancel: &CancellationToken,
    ) -> Result<String, TransportError>;
}

/// Race `fut` against `cancel`.
///
/// On cancellation `fut` is dropped, which abandons whatever I/O it was doing.
pub async fn with_cancellation<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    if cancel.is_cancelled() {
        return Err(TransportError::Cancelled);
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransportError::Cancelled),
        result = fut => result,
    }
}
