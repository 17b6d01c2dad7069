//! Line protocol definitions
//!
//! Plain-text, newline-delimited protocol. Inbound lines are classified
//! into `ClientLine`; outbound lines are `ServerMessage`s whose `Display`
//! output is the exact wire text (the codec adds the `\n`).

use std::fmt;

use crate::types::Identifier;

/// Command that ends a session (matched case-insensitively)
pub const EXIT_COMMAND: &str = "exit";

/// Client → Server line, after the name line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// Whitespace-only line, ignored
    Blank,
    /// The `exit` command
    Exit,
    /// Anything else, trimmed
    Text(String),
}

impl ClientLine {
    /// Classify one inbound line
    pub fn parse(line: &str) -> Self {
        let text = line.trim();
        if text.is_empty() {
            ClientLine::Blank
        } else if text.eq_ignore_ascii_case(EXIT_COMMAND) {
            ClientLine::Exit
        } else {
            ClientLine::Text(text.to_string())
        }
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// A peer registered
    Joined { identifier: Identifier },
    /// A peer was torn down
    Left { identifier: Identifier },
    /// Chat text from a peer
    Chat { from: Identifier, text: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Joined { identifier } => write!(f, "User [{}] joined", identifier),
            ServerMessage::Left { identifier } => write!(f, "User [{}] left", identifier),
            ServerMessage::Chat { from, text } => write!(f, "[{}]: {}", from, text),
        }
    }
}
