//! Chat data model
//!
//! `User` and `Message` are immutable once created. Events and log entries
//! that name a user carry their own copy of the `User` value.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, UserId};

/// A chat participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-generated identity
    pub id: UserId,
    /// Display name (validated nickname)
    pub name: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-generated identity
    pub id: MessageId,
    /// Sender, unset when the sender could not be resolved
    #[serde(default)]
    pub sender: Option<User>,
    /// Arbitrary text
    pub content: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(id: MessageId, sender: Option<User>, content: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            content: content.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Display name of the sender, or "Unknown"
    pub fn sender_name(&self) -> &str {
        self.sender
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_sender_name() {
        let alice = User::new(UserId::from("1"), "alice");
        let msg = Message::new(MessageId("2".into()), Some(alice), "hi");
        assert_eq!(msg.sender_name(), "alice");

        let orphan = Message::new(MessageId("3".into()), None, "hi");
        assert_eq!(orphan.sender_name(), "Unknown");
    }

    #[test]
    fn test_message_timestamp_is_recent() {
        let msg = Message::new(MessageId("1".into()), None, "hi");
        let now = Utc::now().timestamp();
        assert!((now - msg.timestamp).abs() <= 1);
    }

    #[test]
    fn test_message_missing_sender_deserializes() {
        let json = r#"{"id":"5","content":"hello","timestamp":10}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.sender.is_none());
        assert_eq!(msg.content, "hello");
    }
}
