//! Line Relay Library
//!
//! A newline-delimited TCP chat relay built on tokio. Clients connect,
//! send a display name, then every line they send is relayed to every
//! other connected client.
//!
//! # Protocol
//! - First client line: display name (trimmed, empty → `Anonymous`)
//! - Later client lines: chat text, or `exit` (any case) to leave
//! - Server lines: `User [name] joined`, `User [name] left`, `[name]: text`
//!
//! # Architecture
//! - `ChatServer` is the shared context (config + registry) held as `Arc`
//! - `Registry` maps names to connection handles behind one mutex
//! - Each connection has a reader task producing broadcasts and a writer
//!   task draining a bounded outbound queue
//! - Broadcasts never wait: a full queue drops the message for that peer
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use line_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.listen_addr).await.unwrap();
//!     Arc::new(ChatServer::new(config)).run(listener).await;
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::ConnectionHandle;
pub use codec::RelayLineCodec;
pub use config::{DuplicateNames, ServerConfig};
pub use error::{AppError, EnqueueError};
pub use handler::{handle_connection, Disconnect};
pub use message::{ClientLine, ServerMessage};
pub use registry::{BroadcastOutcome, Registry};
pub use server::ChatServer;
pub use types::{ConnectionId, Identifier};
