//! Client-side conversation state.
//!
//! This module owns the conversation history a client shows and the single
//! send it may have in flight. History is mirrored to local storage after
//! every change; loading and error flags live only as long as the process.
//!
//! # Architecture
//!
//! - [`Conversation`] / [`Message`]: the persisted records
//! - [`ChatSession`]: the session manager driving sends through a
//!   [`MessageTransport`](crate::transport::MessageTransport)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use chat_relay::session::{ChatSession, SendOutcome};
//! use chat_relay::storage::LocalStorage;
//! use chat_relay::transport::GraphqlTransport;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let transport = GraphqlTransport::new("http://localhost:8787", Duration::from_secs(60))?;
//! let session = ChatSession::new(Arc::new(transport), LocalStorage::in_memory());
//!
//! if session.send_user_message("Hello!").await == SendOutcome::RolledBack {
//!     eprintln!("send failed: {:?}", session.error());
//! }
//! # Ok(())
//! # }
//! ```

mod chat;
mod conversation;

pub use chat::{CONVERSATIONS_KEY, ChatSession, SendOutcome, THINKING_PLACEHOLDER};
pub use conversation::{Conversation, DEFAULT_TITLE, Message, Role, new_id, now_millis};
