//! GraphQL-over-HTTP transport against the relay service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{MessageTransport, TransportError, WireMessage, with_cancellation};

const SEND_MESSAGE_MUTATION: &str = r"
  mutation SendMessage($messages: [MessageInput!]!) {
    sendMessage(messages: $messages) {
      content
    }
  }
";

const HEALTH_QUERY: &str = r"
  query HealthCheck {
    health {
      status
      timestamp
    }
  }
";

/// Relay health as reported by the `health` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: Option<String>,
}

/// Transport posting GraphQL operations to `<base>/graphql`.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use chat_relay::transport::GraphqlTransport;
///
/// let transport = GraphqlTransport::new("http://localhost:8787", Duration::from_secs(60))?;
/// assert_eq!(transport.endpoint().path(), "/graphql");
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct GraphqlTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl GraphqlTransport {
    /// Create a transport for the relay at `base_url` with a request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a transport using a caller-supplied HTTP client.
    pub fn with_client(base_url: &str, http: reqwest::Client) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&format!("{}/graphql", base_url.trim_end_matches('/')))?;
        Ok(Self { http, endpoint })
    }

    /// Resolved GraphQL endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run the health query.
    pub async fn health(&self) -> Result<HealthStatus, TransportError> {
        let data = self.execute(&json!({ "query": HEALTH_QUERY })).await?;
        let health = data
            .get("health")
            .cloned()
            .ok_or_else(|| TransportError::Protocol("Invalid response from server".into()))?;
        serde_json::from_value(health)
            .map_err(|e| TransportError::Protocol(format!("Invalid health payload: {e}")))
    }

    /// Whether the relay answers the health query with `ok`.
    pub async fn check_connection(&self) -> bool {
        match self.health().await {
            Ok(h) => h.status == "ok",
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "Health check failed");
                false
            }
        }
    }

    /// POST one GraphQL operation and return its `data` object.
    async fn execute(&self, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Network(format!(
                "HTTP error: status {}",
                status.as_u16()
            )));
        }

        let envelope: GraphqlResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                TransportError::Protocol(format!("Malformed response: {e}"))
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        if let Some(first) = envelope.errors.as_deref().and_then(<[GraphqlError]>::first) {
            let message = first
                .message
                .clone()
                .unwrap_or_else(|| "GraphQL error".to_string());
            return Err(TransportError::Protocol(message));
        }

        envelope
            .data
            .ok_or_else(|| TransportError::Protocol("Invalid response from server".into()))
    }
}

#[async_trait::async_trait]
impl MessageTransport for GraphqlTransport {
    async fn send(
        &self,
        messages: &[WireMessage],
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            message_count = messages.len(),
            "Sending messages to relay"
        );

        let body = json!({
            "query": SEND_MESSAGE_MUTATION,
            "variables": { "messages": messages },
        });

        let data = with_cancellation(cancel, self.execute(&body)).await?;

        data.pointer("/sendMessage/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| TransportError::Protocol("Invalid response from server".into()))
    }
}
