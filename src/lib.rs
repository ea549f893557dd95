//! Group WebSocket Chat Server Library
//!
//! A real-time group chat backend built with tokio-tungstenite: clients
//! join one shared room, exchange text messages and see join/leave
//! presence events.
//!
//! # Features
//! - Unary endpoints over `/rpc`: join, send-message, list-users
//! - Bidirectional event stream over `/chat`
//! - Connection cap enforced at stream join
//! - Fan-out of every event to all connected clients
//! - Cleanup on graceful or abrupt disconnect
//!
//! # Architecture
//! - `ChatServer` owns the user directory, connection registry and message
//!   log behind one mutex, and is shared through an `Arc`
//! - Each connection runs on its own task; a chat stream is a `Session`
//!   state machine plus a writer task draining the client's sink
//! - Broadcasts copy the sink list under the lock and send after releasing
//!   it, so a slow client never holds the lock
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use group_chat_server::{serve, ChatServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     serve(listener, Arc::new(ChatServer::new(50))).await;
//! }
//! ```

pub mod banner;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod message;
pub mod model;
pub mod nickname;
pub mod rpc;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, EventSink};
pub use config::{Args, Config};
pub use error::{AppError, SendError};
pub use handler::{handle_connection, serve, CHAT_PATH, RPC_PATH};
pub use message::{ChatEvent, ErrorCode, RpcCall, RpcReply, RpcRequest, RpcResponse};
pub use model::{Message, User};
pub use nickname::is_valid_nickname;
pub use server::{ChatServer, DisconnectPolicy};
pub use session::{run_session, Session, SessionState};
pub use types::{ConnectionId, IdGenerator, MessageId, UserId};
