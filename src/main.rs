//! Group WebSocket Chat Server - Entry Point
//!
//! Loads configuration, binds the TCP listener and serves connections.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use group_chat_server::banner::print_title;
use group_chat_server::logging::init_tracing;
use group_chat_server::{serve, Args, ChatServer, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Use RUST_LOG env var to control log level
    init_tracing("group_chat_server=info");

    let config = Config::load(&args);
    print_title("Group Chat Server", true);

    let listener = TcpListener::bind(config.address()).await?;
    info!(
        "Chat server listening on {} (max connections: {}, disconnect policy: {:?})",
        config.address(),
        config.max_connections,
        config.disconnect_policy()
    );

    let server = ChatServer::new(config.max_connections)
        .with_disconnect_policy(config.disconnect_policy());

    serve(listener, Arc::new(server)).await;
    Ok(())
}
