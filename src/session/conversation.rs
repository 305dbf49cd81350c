//! Conversation and message records.
//!
//! These are the values mirrored to local storage, so their serialized form
//! uses camelCase keys and is the on-disk history format.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transport::WireMessage;

/// Title given to conversations created implicitly by a first send.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Current wall clock as epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fresh opaque identifier for messages and conversations.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user.
    User,
    /// Model reply.
    Assistant,
    /// System prompt.
    System,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse a wire name; unknown names are rejected.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique within its conversation.
    pub id: String,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Creation time, epoch millis.
    pub timestamp: i64,
    /// Set only on an assistant placeholder awaiting its reply.
    #[serde(default)]
    pub is_streaming: bool,
}

impl Message {
    /// A finalized user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
            timestamp: now_millis(),
            is_streaming: false,
        }
    }

    /// An assistant placeholder shown while a reply is pending.
    #[must_use]
    pub fn placeholder(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_millis(),
            is_streaming: true,
        }
    }

    /// Role/content pair sent over the wire.
    #[must_use]
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// An ordered thread of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    /// Chronological send order; never reordered.
    pub messages: Vec<Message>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    /// Create an empty conversation with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`.
    ///
    /// Strictly monotonic: a bump within the same millisecond still advances
    /// the value by one.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + 1);
    }

    /// Append a message and refresh `updated_at`.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Look up a message by id.
    #[must_use]
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Replace a placeholder's content with the final reply.
    ///
    /// Returns `false` if the placeholder is gone.
    pub fn resolve_placeholder(&mut self, id: &str, reply: String) -> bool {
        let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        msg.content = reply;
        msg.is_streaming = false;
        self.touch();
        true
    }

    /// Remove a message by id. Returns `false` if it was not present.
    pub fn remove_message(&mut self, id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        let removed = self.messages.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.touch();
    }
}
