//! Connection handle definition
//!
//! Represents a registered peer: who it is, the producer side of its
//! outbound queue, and the signal that closes its connection.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::EnqueueError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, Identifier};

/// Consumer side of an outbound queue, owned by exactly one writer loop
pub type OutboundReceiver = mpsc::Receiver<ServerMessage>;

/// Create a bounded outbound queue
///
/// `capacity` must be at least 1.
pub fn outbound_queue(capacity: usize) -> (mpsc::Sender<ServerMessage>, OutboundReceiver) {
    mpsc::channel(capacity)
}

/// Registered peer
///
/// The socket halves live in the reader and writer loops; the handle
/// reaches them through `closed`, which ends the reader and stops any
/// blocked write. The connection's supervisor holds a second queue
/// producer, so dropping a handle alone never closes the queue.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Registered display name
    pub identifier: Identifier,
    /// Per-connection ID for logs
    pub id: ConnectionId,
    /// Server → peer queue producer
    sender: mpsc::Sender<ServerMessage>,
    /// Fired when the connection is closed from the registry side
    closed: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        identifier: Identifier,
        id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            identifier,
            id,
            sender,
            closed,
        }
    }

    /// Enqueue a message without waiting
    ///
    /// Fails with `EnqueueError::Full` when the queue is at capacity and
    /// `EnqueueError::Closed` when the writer loop has gone away.
    pub fn try_enqueue(&self, msg: ServerMessage) -> Result<(), EnqueueError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Close the connection: stop its reader and any blocked write
    ///
    /// Consumes the handle so the registry's queue producer is dropped here.
    pub fn close(self) {
        self.closed.cancel();
    }
}
