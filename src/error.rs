//! Error types for the relay
//!
//! Defines connection-level errors and outbound queue errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// All of these are local to one connection (or to startup for
/// `InvalidConfig`); none is ever reported to another peer.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error: over-long line, invalid UTF-8, or IO underneath
    #[error("line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// Peer went away before sending its name line
    #[error("connection closed before a name was received")]
    NameNotReceived,

    /// Bad startup configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Outbound queue enqueue errors
///
/// Returned by a non-blocking enqueue. Callers log these and move on:
/// a dropped message is accepted policy, not a failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity
    #[error("outbound queue full")]
    Full,

    /// The writer side has gone away
    #[error("outbound queue closed")]
    Closed,
}
