//! Terminal chat client.
//!
//! A line-oriented front end over [`ChatSession`]. Plain lines are sent as
//! user messages, `/`-prefixed lines are commands.
//!
//! Every Ctrl-C is routed through one channel for the whole session. At the
//! prompt it quits; while a reply is pending it stops the generation instead.

mod command;

pub use command::{Input, ReplCommand};

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::session::{ChatSession, Conversation, Role, SendOutcome};
use crate::transport::GraphqlTransport;

/// What the prompt produced.
#[derive(Debug, PartialEq, Eq)]
enum Prompt {
    Line(String),
    Eof,
    Interrupted,
}

/// Forward every Ctrl-C into a channel.
///
/// Once installed, SIGINT no longer terminates the process, so every wait in
/// the REPL has to watch the receiver.
fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Wait for the next input line or an interrupt, whichever comes first.
async fn next_prompt<R>(
    lines: &mut Lines<R>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> std::io::Result<Prompt>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        Some(()) = interrupts.recv() => Ok(Prompt::Interrupted),
        line = lines.next_line() => Ok(line?.map_or(Prompt::Eof, Prompt::Line)),
    }
}

/// Wait for a spawned send, stopping the generation on interrupt.
async fn await_send(
    session: &ChatSession,
    mut send: JoinHandle<SendOutcome>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> Result<SendOutcome, JoinError> {
    let outcome = tokio::select! {
        res = &mut send => res,
        Some(()) = interrupts.recv() => {
            debug!("Interrupt received, stopping generation");
            session.stop_generation();
            send.await
        }
    };
    // Extra presses during the send must not quit at the next prompt
    while interrupts.try_recv().is_ok() {}
    outcome
}

/// Interactive chat REPL
#[derive(Debug)]
pub struct ChatRepl {
    session: ChatSession,
    relay: Arc<GraphqlTransport>,
}

impl ChatRepl {
    pub fn new(session: ChatSession, relay: Arc<GraphqlTransport>) -> Self {
        Self { session, relay }
    }

    /// Run the interactive REPL until `/quit`, Ctrl-C at the prompt or end of input.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.print_welcome();
        if let Some(conv) = self.session.current_conversation() {
            print!("{}", render_conversation(&conv));
        }

        let mut interrupts = forward_interrupts();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!(">>> ");
            std::io::stdout().flush()?;

            let line = match next_prompt(&mut lines, &mut interrupts).await? {
                Prompt::Line(line) => line,
                Prompt::Eof | Prompt::Interrupted => {
                    println!();
                    println!("Bye!");
                    break;
                }
            };

            match Input::parse(&line) {
                Input::Empty => {}
                Input::Message(text) => self.process_message(&text, &mut interrupts).await,
                Input::Command(cmd) => {
                    if self.handle_command(cmd).await {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│                 Chat Relay                  │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        println!("Relay: {}", self.relay.endpoint());
        println!("Type /help for commands. Ctrl-C stops a pending reply, or quits at the prompt.");
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&self, cmd: ReplCommand) -> bool {
        match cmd {
            ReplCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Clear => {
                if self.session.clear_conversation() {
                    println!("Conversation cleared.");
                } else {
                    println!("Nothing to clear.");
                }
            }
            ReplCommand::New => {
                self.session.create_conversation();
                println!("Started a new conversation.");
            }
            ReplCommand::List => {
                let current = self.session.current_conversation_id();
                print!(
                    "{}",
                    render_list(&self.session.conversations(), current.as_deref())
                );
            }
            ReplCommand::Switch(n) => {
                let target = self.session.conversations().into_iter().nth(n - 1);
                match target {
                    Some(conv) if self.session.switch_conversation(&conv.id) => {
                        print!("{}", render_conversation(&conv));
                    }
                    _ => println!("No conversation #{n}."),
                }
            }
            ReplCommand::Delete => {
                let deleted = self
                    .session
                    .current_conversation_id()
                    .is_some_and(|id| self.session.delete_conversation(&id));
                if deleted {
                    println!("Conversation deleted.");
                } else {
                    println!("Nothing to delete.");
                }
            }
            ReplCommand::DeleteAll => {
                if self.session.clear_all_conversations() {
                    println!("All conversations deleted.");
                }
            }
            ReplCommand::Health => match self.relay.health().await {
                Ok(h) => println!("Relay is {} ({})", h.status, h.timestamp),
                Err(e) => println!("Relay unreachable: {e}"),
            },
            ReplCommand::Invalid(msg) => {
                println!("{msg}");
                println!("Type /help for available commands");
            }
        }
        false
    }

    async fn process_message(&self, text: &str, interrupts: &mut mpsc::UnboundedReceiver<()>) {
        let session = self.session.clone();
        let owned = text.to_string();
        let send = tokio::spawn(async move { session.send_user_message(&owned).await });

        println!("… Thinking (Ctrl-C to stop)");

        let outcome = await_send(&self.session, send, interrupts).await;

        match outcome {
            Ok(SendOutcome::Replied) => {
                if let Some(reply) = self
                    .session
                    .current_conversation()
                    .and_then(|c| c.messages.last().cloned())
                {
                    println!();
                    println!("{}", reply.content);
                    println!();
                }
            }
            Ok(SendOutcome::RolledBack) => {
                let err = self.session.error().unwrap_or_default();
                eprintln!("Error: {err}");
            }
            Ok(SendOutcome::Busy) => println!("A reply is already pending."),
            Ok(SendOutcome::Skipped) => {}
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

fn print_help() {
    println!();
    println!("Commands:");
    println!("  /help, /h, /?        - Show this help");
    println!("  /new                 - Start a new conversation");
    println!("  /list, /ls           - List conversations");
    println!("  /switch <n>, /s <n>  - Switch to conversation n");
    println!("  /clear               - Empty the current conversation");
    println!("  /delete              - Delete the current conversation");
    println!("  /delete-all          - Delete every conversation");
    println!("  /health              - Check the relay");
    println!("  /quit, /exit, /q     - Exit chat");
    println!();
    println!("Ctrl-C stops a pending reply; at the prompt it exits.");
    println!();
}

/// Render a conversation transcript.
#[must_use]
pub fn render_conversation(conv: &Conversation) -> String {
    let mut out = format!("── {} ──\n", conv.title);
    for msg in &conv.messages {
        let who = match msg.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        out.push_str(&format!("[{who}] {}\n", msg.content));
    }
    out
}

/// Render the numbered conversation list, marking the current one.
#[must_use]
pub fn render_list(conversations: &[Conversation], current: Option<&str>) -> String {
    if conversations.is_empty() {
        return "No conversations yet.\n".to_string();
    }
    conversations
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let marker = if Some(c.id.as_str()) == current { '*' } else { ' ' };
            format!(
                "{marker} {}. {} ({} messages)\n",
                i + 1,
                c.title,
                c.messages.len()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Message;
    use crate::storage::LocalStorage;
    use crate::transport::{MessageTransport, TransportError, WireMessage, with_cancellation};
    use tokio_util::sync::CancellationToken;

    /// Never answers on its own.
    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait::async_trait]
    impl MessageTransport for StalledTransport {
        async fn send(
            &self,
            _messages: &[WireMessage],
            cancel: &CancellationToken,
        ) -> Result<String, TransportError> {
            with_cancellation(cancel, std::future::pending()).await
        }
    }

    fn conversation(title: &str) -> Conversation {
        Conversation::new(title)
    }

    #[test]
    fn test_render_list_marks_current() {
        let a = conversation("first");
        let b = conversation("second");
        let out = render_list(&[a.clone(), b], Some(&a.id));

        assert_eq!(
            out,
            "* 1. first (0 messages)\n  2. second (0 messages)\n"
        );
    }

    #[test]
    fn test_render_list_empty() {
        assert_eq!(render_list(&[], None), "No conversations yet.\n");
    }

    #[test]
    fn test_render_conversation_labels_roles() {
        let mut conv = conversation("chat");
        conv.push(Message::user("hi"));
        let out = render_conversation(&conv);
        assert_eq!(out, "── chat ──\n[you] hi\n");
    }

    #[tokio::test]
    async fn test_interrupt_at_prompt_quits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut lines = BufReader::new(&b"hello\n"[..]).lines();
        tx.send(()).unwrap();

        let prompt = next_prompt(&mut lines, &mut rx).await.unwrap();
        assert_eq!(prompt, Prompt::Interrupted);

        let prompt = next_prompt(&mut lines, &mut rx).await.unwrap();
        assert_eq!(prompt, Prompt::Line("hello".to_string()));
        assert_eq!(next_prompt(&mut lines, &mut rx).await.unwrap(), Prompt::Eof);
    }

    #[tokio::test]
    async fn test_interrupt_during_send_stops_generation() {
        let session = ChatSession::new(Arc::new(StalledTransport), LocalStorage::in_memory());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let send = {
            let session = session.clone();
            tokio::spawn(async move { session.send_user_message("hi").await })
        };
        while !session.is_loading() {
            tokio::task::yield_now().await;
        }
        tx.send(()).unwrap();
        tx.send(()).unwrap();

        let outcome = await_send(&session, send, &mut rx).await.unwrap();
        assert_eq!(outcome, SendOutcome::RolledBack);
        assert!(!session.is_loading());
        assert_eq!(session.error().as_deref(), Some("Request was cancelled"));

        // The second press was consumed with the send, not left for the prompt
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_repl_is_debug() {
        let relay = Arc::new(
            GraphqlTransport::new("http://127.0.0.1:4000", std::time::Duration::from_secs(1))
                .unwrap(),
        );
        let session = ChatSession::new(relay.clone(), LocalStorage::in_memory());
        let repl = ChatRepl::new(session, relay);
        assert!(format!("{repl:?}").starts_with("ChatRepl {"));
    }
}
