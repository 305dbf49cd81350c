//! Conversation session manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;

use crate::storage::LocalStorage;
use crate::transport::{MessageTransport, TransportError, WireMessage};

use super::conversation::{Conversation, DEFAULT_TITLE, Message};

/// Storage key the conversation list is mirrored under.
pub const CONVERSATIONS_KEY: &str = "conversations";

/// Content of the assistant placeholder while a reply is pending.
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// How a call to [`ChatSession::send_user_message`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Content was empty after trimming; nothing happened.
    Skipped,
    /// Another send is still pending; nothing happened.
    Busy,
    /// The placeholder was replaced by the reply.
    Replied,
    /// The placeholder was removed and `error` recorded.
    RolledBack,
}

/// The one send allowed in flight.
#[derive(Debug)]
struct PendingSend {
    send_id: u64,
    conversation_id: String,
    placeholder_id: String,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct SessionState {
    conversations: Vec<Conversation>,
    current_conversation_id: Option<String>,
    error: Option<String>,
    pending: Option<PendingSend>,
}

impl SessionState {
    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn current(&self) -> Option<&Conversation> {
        let id = self.current_conversation_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    fn is_pending_on(&self, conversation_id: &str) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.conversation_id == conversation_id)
    }
}

/// Releases the pending slot if a send's future is dropped mid-flight.
struct PendingGuard<'a> {
    session: &'a ChatSession,
    send_id: u64,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.abandon(self.send_id);
        }
    }
}

/// Owns the conversation list and orchestrates sends against a transport.
///
/// Cloning is cheap and every clone shares the same state, so a presentation
/// layer can call [`stop_generation`](Self::stop_generation) while
/// [`send_user_message`](Self::send_user_message) is suspended on the
/// transport. State locks are never held across an `.await`.
#[derive(Debug, Clone)]
pub struct ChatSession {
    inner: Arc<ChatSessionInner>,
}

#[derive(Debug)]
struct ChatSessionInner {
    state: RwLock<SessionState>,
    transport: Arc<dyn MessageTransport>,
    storage: LocalStorage,
    storage_key: String,
    next_send_id: AtomicU64,
}

impl ChatSession {
    /// Load history from `storage` under [`CONVERSATIONS_KEY`].
    #[must_use]
    pub fn new(transport: Arc<dyn MessageTransport>, storage: LocalStorage) -> Self {
        Self::with_storage_key(transport, storage, CONVERSATIONS_KEY)
    }

    /// Load history from `storage` under a custom key.
    ///
    /// The first stored conversation becomes current. Placeholders left over
    /// from an interrupted process are dropped, since no call is in flight.
    #[must_use]
    pub fn with_storage_key(
        transport: Arc<dyn MessageTransport>,
        storage: LocalStorage,
        storage_key: impl Into<String>,
    ) -> Self {
        let storage_key = storage_key.into();
        let mut conversations: Vec<Conversation> = storage.load(&storage_key, Vec::new());

        for conv in &mut conversations {
            conv.messages.retain(|m| !m.is_streaming);
        }

        let current_conversation_id = conversations.first().map(|c| c.id.clone());

        tracing::debug!(
            storage_key = %storage_key,
            conversation_count = conversations.len(),
            "Loaded conversation history"
        );

        Self {
            inner: Arc::new(ChatSessionInner {
                state: RwLock::new(SessionState {
                    conversations,
                    current_conversation_id,
                    error: None,
                    pending: None,
                }),
                transport,
                storage,
                storage_key,
                next_send_id: AtomicU64::new(1),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &SessionState) {
        self.inner
            .storage
            .save(&self.inner.storage_key, &state.conversations);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Snapshot of all conversations, most recently created first.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.read().conversations.clone()
    }

    /// Snapshot of the current conversation.
    #[must_use]
    pub fn current_conversation(&self) -> Option<Conversation> {
        self.read().current().cloned()
    }

    #[must_use]
    pub fn current_conversation_id(&self) -> Option<String> {
        self.read().current_conversation_id.clone()
    }

    /// Whether a send is awaiting its reply.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().pending.is_some()
    }

    /// Message of the last failed send, cleared when the next one starts.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────

    /// Send `content` as a user message and wait for the reply.
    ///
    /// Appends the user message and a streaming placeholder, then calls the
    /// transport with the conversation's prior history plus the new message.
    /// On success the placeholder takes the reply; on any failure (including
    /// [`stop_generation`](Self::stop_generation)) it is removed and the
    /// failure recorded in [`error`](Self::error). Never fails itself.
    pub async fn send_user_message(&self, content: &str) -> SendOutcome {
        let content = content.trim();
        if content.is_empty() {
            return SendOutcome::Skipped;
        }

        let (send_id, history, cancel) = {
            let mut state = self.write();
            if state.pending.is_some() {
                tracing::warn!("Send rejected: another send is still pending");
                return SendOutcome::Busy;
            }

            let idx = self.current_index_or_create(&mut state);

            let user = Message::user(content);
            let mut history: Vec<WireMessage> = state.conversations[idx]
                .messages
                .iter()
                .map(Message::to_wire)
                .collect();
            history.push(user.to_wire());
            state.conversations[idx].push(user);
            self.persist(&state);

            let placeholder = Message::placeholder(THINKING_PLACEHOLDER);
            let placeholder_id = placeholder.id.clone();
            state.conversations[idx].push(placeholder);
            self.persist(&state);

            let send_id = self.inner.next_send_id.fetch_add(1, Ordering::Relaxed);
            let cancel = CancellationToken::new();
            state.error = None;
            state.pending = Some(PendingSend {
                send_id,
                conversation_id: state.conversations[idx].id.clone(),
                placeholder_id,
                cancel: cancel.clone(),
            });

            tracing::info!(
                send_id,
                conversation_id = %state.conversations[idx].id,
                history_len = history.len(),
                "Sending user message"
            );

            (send_id, history, cancel)
        };

        let guard = PendingGuard {
            session: self,
            send_id,
            armed: true,
        };
        let result = self.inner.transport.send(&history, &cancel).await;
        guard.disarm();

        let mut state = self.write();
        let Some(pending) = state.pending.take_if(|p| p.send_id == send_id) else {
            // stop_generation already rolled this send back.
            tracing::debug!(send_id, "Send resolved after cancellation; ignoring result");
            return SendOutcome::RolledBack;
        };

        match result {
            Ok(reply) => {
                let reply_len = reply.len();
                if let Some(conv) = state.conversation_mut(&pending.conversation_id) {
                    conv.resolve_placeholder(&pending.placeholder_id, reply);
                }
                self.persist(&state);
                tracing::info!(send_id, reply_len, "Reply received");
                SendOutcome::Replied
            }
            Err(e) => {
                tracing::warn!(send_id, error = %e, "Send failed; rolling back placeholder");
                self.roll_back(&mut state, &pending, e.to_string());
                SendOutcome::RolledBack
            }
        }
    }

    /// Cancel the pending send, if any.
    ///
    /// The placeholder is removed immediately and the in-flight transport call
    /// is abandoned. Calling this with nothing pending is a no-op.
    pub fn stop_generation(&self) {
        let mut state = self.write();
        let Some(pending) = state.pending.take() else {
            return;
        };

        pending.cancel.cancel();
        tracing::info!(send_id = pending.send_id, "Generation stopped");
        self.roll_back(&mut state, &pending, TransportError::Cancelled.to_string());
    }

    fn roll_back(&self, state: &mut SessionState, pending: &PendingSend, error: String) {
        if let Some(conv) = state.conversation_mut(&pending.conversation_id) {
            conv.remove_message(&pending.placeholder_id);
        }
        state.error = Some(error);
        self.persist(state);
    }

    /// Roll back `send_id` if it still owns the pending slot.
    fn abandon(&self, send_id: u64) {
        let mut state = self.write();
        let Some(pending) = state.pending.take_if(|p| p.send_id == send_id) else {
            return;
        };

        pending.cancel.cancel();
        tracing::info!(send_id, "Send dropped before completion; rolling back");
        self.roll_back(&mut state, &pending, TransportError::Cancelled.to_string());
    }

    /// Index of the current conversation, creating one first if needed.
    fn current_index_or_create(&self, state: &mut SessionState) -> usize {
        let existing = state
            .current_conversation_id
            .as_deref()
            .and_then(|id| state.conversations.iter().position(|c| c.id == id));

        if let Some(idx) = existing {
            return idx;
        }

        let conv = Conversation::new(DEFAULT_TITLE);
        tracing::debug!(conversation_id = %conv.id, "Created conversation");
        state.current_conversation_id = Some(conv.id.clone());
        state.conversations.insert(0, conv);
        self.persist(state);
        0
    }

    // ─────────────────────────────────────────────────────────────────────
    // Conversation management
    // ─────────────────────────────────────────────────────────────────────

    /// Empty the current conversation.
    ///
    /// Returns `false` if there is no current conversation or a send is
    /// pending on it.
    pub fn clear_conversation(&self) -> bool {
        let mut state = self.write();
        let Some(id) = state.current_conversation_id.clone() else {
            return false;
        };
        if state.is_pending_on(&id) {
            tracing::warn!(conversation_id = %id, "Clear refused while a send is pending");
            return false;
        }
        let Some(conv) = state.conversation_mut(&id) else {
            return false;
        };

        conv.clear();
        self.persist(&state);
        true
    }

    /// Start a new empty conversation and make it current.
    pub fn create_conversation(&self) -> String {
        let mut state = self.write();
        let conv = Conversation::new(DEFAULT_TITLE);
        let id = conv.id.clone();
        state.conversations.insert(0, conv);
        state.current_conversation_id = Some(id.clone());
        self.persist(&state);
        id
    }

    /// Make `id` the current conversation. Returns `false` if it is unknown.
    pub fn switch_conversation(&self, id: &str) -> bool {
        let mut state = self.write();
        if !state.conversations.iter().any(|c| c.id == id) {
            return false;
        }
        state.current_conversation_id = Some(id.to_string());
        state.error = None;
        true
    }

    /// Delete a conversation.
    ///
    /// If it was current, the first remaining conversation becomes current.
    /// Returns `false` if it is unknown or has a send pending.
    pub fn delete_conversation(&self, id: &str) -> bool {
        let mut state = self.write();
        if state.is_pending_on(id) {
            tracing::warn!(conversation_id = %id, "Delete refused while a send is pending");
            return false;
        }

        let before = state.conversations.len();
        state.conversations.retain(|c| c.id != id);
        if state.conversations.len() == before {
            return false;
        }

        if state.current_conversation_id.as_deref() == Some(id) {
            state.current_conversation_id = state.conversations.first().map(|c| c.id.clone());
        }
        self.persist(&state);
        true
    }

    /// Delete every conversation. Refused while a send is pending.
    pub fn clear_all_conversations(&self) -> bool {
        let mut state = self.write();
        if state.pending.is_some() {
            tracing::warn!("Clear-all refused while a send is pending");
            return false;
        }
        state.conversations.clear();
        state.current_conversation_id = None;
        self.persist(&state);
        true
    }
}
