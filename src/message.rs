//! Message protocol definitions
//!
//! JSON-based protocol using Serde's tagged enums for type-safe
//! serialization/deserialization:
//! - `ChatEvent`: the only payload on the chat stream, in both directions
//! - `RpcRequest` / `RpcResponse`: unary calls, correlated by `id`

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::{Message, User};
use crate::types::{MessageId, UserId};

/// Chat stream event
///
/// Client → Server and Server → Client use the same union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A user entered the room
    UserJoined(User),
    /// A user left the room
    UserLeft(User),
    /// A chat message
    Message(Message),
}

impl ChatEvent {
    /// Short variant name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::UserJoined(_) => "user_joined",
            ChatEvent::UserLeft(_) => "user_left",
            ChatEvent::Message(_) => "message",
        }
    }
}

/// Console rendering used by the interactive client
impl std::fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatEvent::UserJoined(user) => write!(f, ">>> {} joined", user.name),
            ChatEvent::UserLeft(user) => write!(f, "<<< {} left", user.name),
            ChatEvent::Message(msg) => write!(f, "[{}]: {}", msg.sender_name(), msg.content),
        }
    }
}

/// Unary request frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen correlation id, echoed in the response
    pub id: u64,
    #[serde(flatten)]
    pub call: RpcCall,
}

/// Unary call with its arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RpcCall {
    /// Allocate an identity for a display name
    Join { username: String },
    /// Append a message to the log without broadcasting it
    SendMessage { user_id: UserId, content: String },
    /// Display names of connected stream clients
    ListUsers,
}

/// Unary response frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request this answers; None when the request was unreadable
    pub id: Option<u64>,
    #[serde(flatten)]
    pub reply: RpcReply,
}

/// Unary call result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RpcReply {
    Join { user: User, message: String },
    SendMessage { success: bool, message_id: MessageId },
    ListUsers { usernames: Vec<String> },
    Error { code: ErrorCode, message: String },
}

/// Error codes for RpcReply::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request frame could not be decoded
    InvalidRequest,
    /// Username does not satisfy the nickname policy
    InvalidUsername,
    /// Anything else
    Internal,
}

/// Convert AppError to RpcReply for client notification
impl From<AppError> for RpcReply {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::Json(e) => (ErrorCode::InvalidRequest, format!("Invalid request: {}", e)),
            AppError::InvalidUsername(name) => (
                ErrorCode::InvalidUsername,
                format!(
                    "Invalid username '{}': use 3-12 chars, start with a letter, only letters/numbers/_",
                    name
                ),
            ),
            _ => (ErrorCode::Internal, "Internal error".to_string()),
        };
        RpcReply::Error { code, message }
    }
}
