//! Unary endpoints
//!
//! Maps each `RpcCall` onto the `ChatServer`. None of these calls touch
//! the broadcast path.

use tracing::debug;

use crate::error::AppError;
use crate::message::{RpcCall, RpcReply};
use crate::nickname::is_valid_nickname;
use crate::server::{ChatServer, JOIN_ACK};

/// Execute one unary call
pub async fn dispatch(server: &ChatServer, call: RpcCall) -> RpcReply {
    match call {
        RpcCall::Join { username } => {
            if !is_valid_nickname(&username) {
                debug!("Rejected join with invalid username '{}'", username);
                return AppError::InvalidUsername(username).into();
            }
            let user = server.join(&username).await;
            RpcReply::Join {
                user,
                message: JOIN_ACK.to_string(),
            }
        }
        RpcCall::SendMessage { user_id, content } => {
            let msg = server.send_message(&user_id, content).await;
            RpcReply::SendMessage {
                success: true,
                message_id: msg.id,
            }
        }
        RpcCall::ListUsers => RpcReply::ListUsers {
            usernames: server.list_users().await,
        },
    }
}
