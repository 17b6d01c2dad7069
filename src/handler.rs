//! TCP connection handler
//!
//! Supervises one client connection: reads the name line, registers the
//! peer, runs the reader and writer loops, and tears everything down.
//!
//! Lifecycle: connecting → registered → active → disconnecting → removed.
//! Every way out of `active` (exit command, read error or EOF, writer
//! failure, close from the registry) goes through the same teardown.

use std::fmt;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{outbound_queue, ConnectionHandle, OutboundReceiver};
use crate::codec::RelayLineCodec;
use crate::error::AppError;
use crate::message::{ClientLine, ServerMessage};
use crate::server::ChatServer;
use crate::types::{ConnectionId, Identifier};

/// Why a connection left the active state
#[derive(Debug)]
pub enum Disconnect {
    /// Peer sent the exit command
    Exit,
    /// Peer closed its end
    Eof,
    /// Read or framing failure
    ReadFailed(LinesCodecError),
    /// Closed through the registry
    Closed,
    /// Writer loop failed
    WriterStopped,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Exit => write!(f, "requested exit"),
            Disconnect::Eof => write!(f, "connection closed by peer"),
            Disconnect::ReadFailed(e) => write!(f, "read failed: {}", e),
            Disconnect::Closed => write!(f, "closed by server"),
            Disconnect::WriterStopped => write!(f, "writer stopped"),
        }
    }
}

/// Handle a new TCP connection
///
/// Returns an error only if the peer never got registered; failures
/// after registration are logged and end in the normal teardown.
pub async fn handle_connection(stream: TcpStream, server: Arc<ChatServer>) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (read_half, write_half) = stream.into_split();
    supervise(read_half, write_half, peer_addr, server).await
}

/// Run one connection from name line to teardown over any byte streams
pub async fn supervise<R, W>(
    read_half: R,
    write_half: W,
    peer_addr: String,
    server: Arc<ChatServer>,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let conn_id = ConnectionId::new();
    debug!(conn = %conn_id, peer = %peer_addr, "New connection");

    let codec = RelayLineCodec::new(server.config().max_line_length);
    let mut lines = FramedRead::new(read_half, codec.clone());
    let sink = FramedWrite::new(write_half, codec);

    // First line is the display name
    let name_line = match lines.next().await {
        Some(line) => line?,
        None => return Err(AppError::NameNotReceived),
    };

    // The supervisor keeps its own producer so the queue stays open for
    // as long as the connection lives, registered or not.
    let (sender, receiver) = outbound_queue(server.config().queue_capacity);
    let closed = CancellationToken::new();
    let requested = Identifier::from_name_line(&name_line);
    let identifier = server.registry().claim(requested.clone(), |id| {
        ConnectionHandle::new(id, conn_id, sender.clone(), closed.clone())
    });

    if identifier != requested {
        info!(
            requested = %requested,
            assigned = %identifier,
            conn = %conn_id,
            "Name already taken, registered under a suffixed name"
        );
    }
    info!(identifier = %identifier, conn = %conn_id, peer = %peer_addr, "User joined");
    server.broadcast_from(
        &identifier,
        ServerMessage::Joined {
            identifier: identifier.clone(),
        },
    );

    let writer = tokio::spawn(write_loop(sink, receiver, identifier.clone(), closed.clone()));

    let reason = tokio::select! {
        reason = read_loop(&mut lines, &server, &identifier, closed.clone()) => reason,
        result = writer => match result {
            // The writer only stops cleanly once the connection is closed
            Ok(Ok(())) => Disconnect::Closed,
            Ok(Err(e)) => {
                warn!(identifier = %identifier, error = %e, "Write failed");
                Disconnect::WriterStopped
            }
            Err(e) => {
                error!(identifier = %identifier, error = %e, "Writer task failed");
                Disconnect::WriterStopped
            }
        },
    };

    match &reason {
        Disconnect::ReadFailed(_) => {
            warn!(identifier = %identifier, conn = %conn_id, "Client {}", reason)
        }
        _ => info!(identifier = %identifier, conn = %conn_id, "Client {}", reason),
    }

    server.registry().unregister(&identifier);
    closed.cancel();
    drop(sender);

    info!(identifier = %identifier, conn = %conn_id, "User left");
    server.broadcast_from(
        &identifier,
        ServerMessage::Left {
            identifier: identifier.clone(),
        },
    );

    Ok(())
}

/// Read lines until exit, EOF, a read error or the close signal
///
/// Blank lines are skipped; everything else is broadcast as chat from
/// `identifier` to every other peer.
pub async fn read_loop<R>(
    lines: &mut FramedRead<R, RelayLineCodec>,
    server: &ChatServer,
    identifier: &Identifier,
    closed: CancellationToken,
) -> Disconnect
where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => return Disconnect::Closed,
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Disconnect::ReadFailed(e),
            None => return Disconnect::Eof,
        };

        match ClientLine::parse(&line) {
            ClientLine::Blank => continue,
            ClientLine::Exit => return Disconnect::Exit,
            ClientLine::Text(text) => {
                debug!(identifier = %identifier, "Chat line ({} bytes)", text.len());
                server.broadcast_from(
                    identifier,
                    ServerMessage::Chat {
                        from: identifier.clone(),
                        text,
                    },
                );
            }
        }
    }
}

/// Drain the outbound queue to the socket
///
/// Ends with `Ok` once the queue is closed and empty, shutting down the
/// write half. After `closed` fires, a write that cannot complete at once
/// is abandoned and the write half dropped. A write failure ends it
/// immediately with the error.
pub async fn write_loop<W>(
    mut sink: FramedWrite<W, RelayLineCodec>,
    mut receiver: OutboundReceiver,
    identifier: Identifier,
    closed: CancellationToken,
) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = receiver.recv().await {
        tokio::select! {
            biased;
            sent = sink.send(msg.to_string()) => sent?,
            _ = closed.cancelled() => {
                debug!(identifier = %identifier, "Connection closed, dropping pending writes");
                return Ok(());
            }
        }
    }

    debug!(identifier = %identifier, "Write task ended");

    // Send FIN when done
    tokio::select! {
        biased;
        result = SinkExt::<String>::close(&mut sink) => {
            if let Err(e) = result {
                debug!(identifier = %identifier, error = %e, "Failed to shut down write half");
            }
        }
        _ = closed.cancelled() => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::config::ServerConfig;

    fn server_with(names: &[&str]) -> (ChatServer, Vec<OutboundReceiver>) {
        let server = ChatServer::new(ServerConfig::default());
        let receivers = names
            .iter()
            .map(|name| {
                let (tx, rx) = outbound_queue(16);
                server.registry().claim(Identifier::from(*name), |id| {
                    ConnectionHandle::new(id, ConnectionId::new(), tx, CancellationToken::new())
                });
                rx
            })
            .collect();
        (server, receivers)
    }

    #[tokio::test]
    async fn test_read_loop_broadcasts_and_exits() {
        let (server, mut receivers) = server_with(&["bob", "carol"]);
        let (mut client, socket) = duplex(1024);
        let mut lines = FramedRead::new(socket, RelayLineCodec::new(1024));

        client
            .write_all(b"hello\n   \nEXIT\nafter exit\n")
            .await
            .unwrap();

        let bob = Identifier::from("bob");
        let reason = read_loop(&mut lines, &server, &bob, CancellationToken::new()).await;
        assert!(matches!(reason, Disconnect::Exit));

        let carol_rx = &mut receivers[1];
        assert_eq!(carol_rx.try_recv().unwrap().to_string(), "[bob]: hello");
        assert!(carol_rx.try_recv().is_err());

        let bob_rx = &mut receivers[0];
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_loop_eof_discards_partial_line() {
        let (server, mut receivers) = server_with(&["bob", "carol"]);
        let (mut client, socket) = duplex(1024);
        let mut lines = FramedRead::new(socket, RelayLineCodec::new(1024));

        client.write_all(b"unterminated").await.unwrap();
        drop(client);

        let bob = Identifier::from("bob");
        let reason = read_loop(&mut lines, &server, &bob, CancellationToken::new()).await;
        assert!(matches!(reason, Disconnect::Eof));
        assert!(receivers[1].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_loop_stops_on_close_signal() {
        let (server, _receivers) = server_with(&["bob"]);
        let (_client, socket) = duplex(1024);
        let mut lines = FramedRead::new(socket, RelayLineCodec::new(1024));

        let closed = CancellationToken::new();
        closed.cancel();

        let bob = Identifier::from("bob");
        let reason = read_loop(&mut lines, &server, &bob, closed).await;
        assert!(matches!(reason, Disconnect::Closed));
    }

    #[tokio::test]
    async fn test_read_loop_line_too_long() {
        let (server, _receivers) = server_with(&["bob"]);
        let (mut client, socket) = duplex(1024);
        let mut lines = FramedRead::new(socket, RelayLineCodec::new(8));

        client.write_all(b"much longer than eight\n").await.unwrap();

        let bob = Identifier::from("bob");
        let reason = read_loop(&mut lines, &server, &bob, CancellationToken::new()).await;
        assert!(matches!(
            reason,
            Disconnect::ReadFailed(LinesCodecError::MaxLineLengthExceeded)
        ));
    }

    #[tokio::test]
    async fn test_write_loop_drains_then_closes() {
        let (mut client, socket) = duplex(1024);
        let sink = FramedWrite::new(socket, RelayLineCodec::new(1024));
        let (tx, rx) = outbound_queue(16);

        tx.try_send(ServerMessage::Joined {
            identifier: Identifier::from("alice"),
        })
        .unwrap();
        tx.try_send(ServerMessage::Chat {
            from: Identifier::from("alice"),
            text: "hi".to_string(),
        })
        .unwrap();
        drop(tx);

        write_loop(sink, rx, Identifier::from("bob"), CancellationToken::new())
            .await
            .unwrap();

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "User [alice] joined\n[alice]: hi\n");
    }

    #[tokio::test]
    async fn test_write_loop_fails_on_broken_socket() {
        let (client, socket) = duplex(1024);
        drop(client);
        let sink = FramedWrite::new(socket, RelayLineCodec::new(1024));
        let (tx, rx) = outbound_queue(16);

        tx.try_send(ServerMessage::Left {
            identifier: Identifier::from("alice"),
        })
        .unwrap();

        let result = write_loop(sink, rx, Identifier::from("bob"), CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unregister_releases_blocked_writer() {
        let server = ChatServer::new(ServerConfig::default());
        let stuck = Identifier::from("stuck");
        let (tx, rx) = outbound_queue(16);
        // Held the way a supervisor holds its own producer
        let held = tx.clone();
        let closed = CancellationToken::new();
        server.registry().claim(stuck.clone(), |id| {
            ConnectionHandle::new(id, ConnectionId::new(), tx, closed.clone())
        });

        // Peer never reads and the pipe only buffers 8 bytes
        let (_peer, socket) = duplex(8);
        let sink = FramedWrite::new(socket, RelayLineCodec::new(1024));
        let writer = tokio::spawn(write_loop(sink, rx, stuck.clone(), closed));

        server.broadcast_from(
            &Identifier::from("x"),
            ServerMessage::Chat {
                from: Identifier::from("x"),
                text: "far more than eight bytes".to_string(),
            },
        );
        sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());

        assert!(server.registry().unregister(&stuck));

        let result = timeout(Duration::from_secs(1), writer)
            .await
            .expect("writer still blocked after unregister")
            .unwrap();
        assert!(result.is_ok());
        drop(held);
    }

    #[tokio::test]
    async fn test_write_failure_tears_down_connection() {
        let server = Arc::new(ChatServer::new(ServerConfig::default()));
        let (tx, mut watcher) = outbound_queue(16);
        server.registry().claim(Identifier::from("watcher"), |id| {
            ConnectionHandle::new(id, ConnectionId::new(), tx, CancellationToken::new())
        });

        // Separate pipes so the inbound side stays open while writes fail
        let (mut client_in, server_in) = duplex(1024);
        let (client_out, server_out) = duplex(1024);
        drop(client_out);

        let supervisor = tokio::spawn(supervise(
            server_in,
            server_out,
            "in-memory".to_string(),
            Arc::clone(&server),
        ));
        client_in.write_all(b"zed\n").await.unwrap();

        let zed = Identifier::from("zed");
        let joined = timeout(Duration::from_secs(1), watcher.recv()).await.unwrap();
        assert_eq!(joined, Some(ServerMessage::Joined { identifier: zed.clone() }));

        server.broadcast_from(
            &Identifier::from("watcher"),
            ServerMessage::Chat {
                from: Identifier::from("watcher"),
                text: "ping".to_string(),
            },
        );

        timeout(Duration::from_secs(1), supervisor)
            .await
            .expect("supervisor did not tear down")
            .unwrap()
            .unwrap();

        assert_eq!(
            watcher.try_recv().ok(),
            Some(ServerMessage::Left { identifier: zed.clone() })
        );
        assert!(watcher.try_recv().is_err());
        assert!(!server.registry().contains(&zed));
        drop(client_in);
    }
}
