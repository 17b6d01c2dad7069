//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `Identifier`: the display name a peer registers under
//! - `ConnectionId`: UUID-based per-connection identifier for logs

use uuid::Uuid;

/// Display name used when a peer sends an empty name line
pub const DEFAULT_IDENTIFIER: &str = "Anonymous";

/// Display name of a connected peer (newtype pattern)
///
/// Used as the registry key. Not unique by itself; the registry's
/// duplicate policy decides what happens on collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    /// Build an identifier from the raw first line a peer sends
    ///
    /// Surrounding whitespace is trimmed; an empty result maps to
    /// [`DEFAULT_IDENTIFIER`].
    pub fn from_name_line(line: &str) -> Self {
        let name = line.trim();
        if name.is_empty() {
            Self(DEFAULT_IDENTIFIER.to_string())
        } else {
            Self(name.to_string())
        }
    }

    /// Disambiguated form of this identifier: `name (n)`
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{} ({})", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Distinguishes two connections that share a
/// display name in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
