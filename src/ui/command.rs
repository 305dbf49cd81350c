//! Parsing of REPL input lines.

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Message(String),
    Command(ReplCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    /// Empty the current conversation.
    Clear,
    New,
    List,
    /// Switch to the n-th conversation as shown by `/list` (1-based).
    Switch(usize),
    Delete,
    DeleteAll,
    Health,
    Quit,
    Invalid(String),
}

impl Input {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Message(line.to_string());
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        let cmd = match name {
            "/help" | "/h" | "/?" => ReplCommand::Help,
            "/clear" => ReplCommand::Clear,
            "/new" => ReplCommand::New,
            "/list" | "/ls" => ReplCommand::List,
            "/switch" | "/s" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(n) if n > 0 => ReplCommand::Switch(n),
                _ => ReplCommand::Invalid("Usage: /switch <number from /list>".to_string()),
            },
            "/delete" => ReplCommand::Delete,
            "/delete-all" => ReplCommand::DeleteAll,
            "/health" => ReplCommand::Health,
            "/quit" | "/exit" | "/q" => ReplCommand::Quit,
            other => ReplCommand::Invalid(format!("Unknown command: {other}")),
        };
        Self::Command(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            Input::parse("  hello there "),
            Input::Message("hello there".into())
        );
        assert_eq!(Input::parse("   "), Input::Empty);
    }

    #[test]
    fn test_switch_needs_positive_number() {
        assert_eq!(
            Input::parse("/switch 2"),
            Input::Command(ReplCommand::Switch(2))
        );
        assert!(matches!(
            Input::parse("/switch 0"),
            Input::Command(ReplCommand::Invalid(_))
        ));
        assert!(matches!(
            Input::parse("/switch"),
            Input::Command(ReplCommand::Invalid(_))
        ));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(Input::parse("/q"), Input::Command(ReplCommand::Quit));
        assert_eq!(Input::parse("/ls"), Input::Command(ReplCommand::List));
        assert_eq!(
            Input::parse("/frobnicate"),
            Input::Command(ReplCommand::Invalid(
                "Unknown command: /frobnicate".into()
            ))
        );
    }
}
