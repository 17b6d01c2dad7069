//! ChatServer context and accept loop
//!
//! `ChatServer` owns everything shared between connections: the config
//! and the registry. It is built once at startup and handed to every
//! connection supervisor as an `Arc`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::message::ServerMessage;
use crate::registry::{BroadcastOutcome, Registry};
use crate::types::Identifier;

/// Shared server state
#[derive(Debug)]
pub struct ChatServer {
    config: ServerConfig,
    registry: Registry,
}

impl ChatServer {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Registry::new(config.duplicate_names);
        Self { config, registry }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fan `msg` out to every registered peer except `origin`
    pub fn broadcast_from(&self, origin: &Identifier, msg: ServerMessage) -> BroadcastOutcome {
        self.registry.broadcast(origin, &msg, false)
    }

    /// Accept connections until the process exits
    ///
    /// Each connection gets its own supervisor task. Accept errors are
    /// logged and the loop keeps going.
    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        info!("ChatServer started");

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let server = Arc::clone(&self);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, server).await {
                            error!("Connection handler error ({}): {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::client::{outbound_queue, ConnectionHandle};
    use crate::types::ConnectionId;

    #[test]
    fn test_registry_follows_config() {
        let config = ServerConfig {
            duplicate_names: crate::config::DuplicateNames::Overwrite,
            ..ServerConfig::default()
        };
        let server = ChatServer::new(config);

        for _ in 0..2 {
            let (tx, _rx) = outbound_queue(server.config().queue_capacity);
            server.registry().claim(Identifier::from("eve"), |id| {
                ConnectionHandle::new(id, ConnectionId::new(), tx, CancellationToken::new())
            });
        }

        assert_eq!(server.registry().len(), 1);
    }

    #[test]
    fn test_broadcast_from_excludes_origin() {
        let server = ChatServer::new(ServerConfig::default());
        let (tx, mut rx) = outbound_queue(4);
        server.registry().claim(Identifier::from("eve"), |id| {
            ConnectionHandle::new(id, ConnectionId::new(), tx, CancellationToken::new())
        });

        let msg = ServerMessage::Joined {
            identifier: Identifier::from("eve"),
        };
        let outcome = server.broadcast_from(&Identifier::from("eve"), msg);

        assert_eq!(outcome.delivered, 0);
        assert!(rx.try_recv().is_err());
    }
}
