//! Error types for the chat server
//!
//! Defines application-level errors and sink send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers transport failures (connection termination) and
/// request errors (reported back to the client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry is at its connection cap
    #[error("Server full ({max_connections} connections)")]
    ServerFull { max_connections: usize },

    /// Peer closed the stream
    #[error("Stream closed")]
    StreamClosed,

    /// Handshake path does not name an endpoint
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Username does not satisfy the nickname policy
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Unary call did not complete before the caller's deadline
    #[error("Request timed out")]
    Timeout,

    /// Response did not match the request
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Sink send errors
///
/// Occurs when pushing an event to a client's outbound channel fails.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client is not draining its channel fast enough
    #[error("Channel full")]
    ChannelFull,
}
