//! Line Relay Server - Entry Point
//!
//! Loads configuration, binds the TCP listener and runs the accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use line_relay::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("line_relay=info")),
        )
        .init();

    // Bind address from the command line, policy from the environment
    let config = ServerConfig::from_env()?;

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(
        "Chat relay listening on {} (duplicate names: {:?})",
        config.listen_addr, config.duplicate_names
    );

    let server = Arc::new(ChatServer::new(config));
    server.run(listener).await;

    Ok(())
}
