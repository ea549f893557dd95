//! ChatServer: user directory, connection registry, broadcast engine
//!
//! All shared state (directory, registry, message log) lives in one
//! `State` behind a single mutex. The lock is never held across an await
//! point other than its own acquisition.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{Client, EventSink};
use crate::error::AppError;
use crate::message::ChatEvent;
use crate::model::{Message, User};
use crate::types::{IdGenerator, UserId};

/// Acknowledgment string returned by `join`
pub const JOIN_ACK: &str = "joined";

/// What to broadcast when a stream drops without an explicit leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectPolicy {
    /// Broadcast a synthetic `UserLeft`
    #[default]
    Announce,
    /// Deregister quietly
    Silent,
}

/// Everything guarded by the server lock
#[derive(Debug, Default)]
struct State {
    /// User directory: UserId -> User
    users: HashMap<UserId, User>,
    /// Connection registry: UserId -> Client
    clients: HashMap<UserId, Client>,
    /// Append-only message log
    messages: Vec<Message>,
}

/// The chat server
///
/// Constructed once at startup and shared with every connection task
/// through an `Arc`.
#[derive(Debug)]
pub struct ChatServer {
    state: Mutex<State>,
    max_connections: usize,
    disconnect_policy: DisconnectPolicy,
    ids: IdGenerator,
}

impl ChatServer {
    /// Create a server admitting at most `max_connections` stream clients
    pub fn new(max_connections: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_connections,
            disconnect_policy: DisconnectPolicy::default(),
            ids: IdGenerator::new(),
        }
    }

    pub fn with_disconnect_policy(mut self, policy: DisconnectPolicy) -> Self {
        self.disconnect_policy = policy;
        self
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn disconnect_policy(&self) -> DisconnectPolicy {
        self.disconnect_policy
    }

    /// Identity source shared by users and messages
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Add a stream client to the registry
    ///
    /// Rejects without touching any state when the registry is full.
    /// On success the directory entry for the user is upserted and the
    /// new registry size is returned.
    pub async fn register(&self, user: User, sender: EventSink) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;

        if state.clients.len() >= self.max_connections {
            warn!(
                "Max connections reached, rejecting user {} (ID: {})",
                user.name, user.id
            );
            return Err(AppError::ServerFull {
                max_connections: self.max_connections,
            });
        }

        state.users.insert(user.id.clone(), user.clone());
        state.clients.insert(user.id.clone(), Client::new(user, sender));
        Ok(state.clients.len())
    }

    /// Remove a user from the registry and the directory
    ///
    /// Returns the user if they were registered. Removing an absent
    /// identity is a no-op.
    pub async fn deregister(&self, user_id: &UserId) -> Option<User> {
        let mut state = self.state.lock().await;

        let client = state.clients.remove(user_id);
        let user = state.users.remove(user_id);
        let remaining = state.clients.len();
        drop(state);

        let client = client?;
        debug!("Deregistered {} (total: {})", user_id, remaining);
        Some(user.unwrap_or(client.user))
    }

    /// Remove `user_id` only while it is still registered with `sink`
    ///
    /// Used by a session cleaning up after itself, so a later stream that
    /// joined under the same identity keeps its registration.
    pub async fn deregister_sink(&self, user_id: &UserId, sink: &EventSink) -> Option<User> {
        let mut state = self.state.lock().await;

        let owned = state
            .clients
            .get(user_id)
            .is_some_and(|c| c.sender.same_channel(sink));
        if !owned {
            return None;
        }

        let client = state.clients.remove(user_id)?;
        let user = state.users.remove(user_id);
        let remaining = state.clients.len();
        drop(state);

        debug!("Deregistered {} (total: {})", user_id, remaining);
        Some(user.unwrap_or(client.user))
    }

    /// Push an event to every registered sink
    ///
    /// The sink list is copied under the lock and the sends happen after
    /// it is released. Per-sink failures are logged and skipped; the
    /// client stays registered. Returns the number of sinks that accepted
    /// the event.
    pub async fn broadcast(&self, event: ChatEvent) -> usize {
        let targets: Vec<Client> = {
            let state = self.state.lock().await;
            state.clients.values().cloned().collect()
        };

        let mut delivered = 0;
        for client in &targets {
            match client.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Dropped {} event for {} ({}): {}",
                    event.kind(),
                    client.display_name(),
                    client.user.id,
                    e
                ),
            }
        }

        debug!(
            "Broadcast {} to {}/{} clients",
            event.kind(),
            delivered,
            targets.len()
        );
        delivered
    }

    /// Allocate an identity for `username` and add it to the directory
    ///
    /// Does not connect a stream or notify anyone.
    pub async fn join(&self, username: &str) -> User {
        let user = User::new(self.ids.next_user_id(), username);

        self.state
            .lock()
            .await
            .users
            .insert(user.id.clone(), user.clone());

        info!("User {} registered via join (ID: {})", user.name, user.id);
        user
    }

    /// Append a message from `user_id` to the log without broadcasting
    ///
    /// An unknown `user_id` leaves the sender unset.
    pub async fn send_message(&self, user_id: &UserId, content: String) -> Message {
        let mut state = self.state.lock().await;

        let sender = state.users.get(user_id).cloned();
        if sender.is_none() {
            debug!("send_message from unknown user {}", user_id);
        }

        let msg = Message::new(self.ids.next_message_id(), sender, content);
        state.messages.push(msg.clone());
        msg
    }

    /// Append a streamed message to the log
    ///
    /// The message gets a fresh identity and timestamp; sender and
    /// content are kept as received.
    pub async fn ingest_message(&self, msg: Message) -> Message {
        let msg = Message::new(self.ids.next_message_id(), msg.sender, msg.content);
        self.state.lock().await.messages.push(msg.clone());
        msg
    }

    /// Display names of all connected stream clients, in map order
    pub async fn list_users(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .clients
            .values()
            .map(|c| c.display_name().to_string())
            .collect()
    }

    /// Number of registered stream clients
    pub async fn connected_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    /// Whether `user_id` has a registered stream
    pub async fn is_connected(&self, user_id: &UserId) -> bool {
        self.state.lock().await.clients.contains_key(user_id)
    }

    /// Number of users in the directory
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Directory lookup
    pub async fn find_user(&self, user_id: &UserId) -> Option<User> {
        self.state.lock().await.users.get(user_id).cloned()
    }

    /// Snapshot of the message log in append order
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::client::event_channel;

    fn user(id: &str, name: &str) -> User {
        User::new(UserId::from(id), name)
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let server = ChatServer::new(10);
        let (tx, _rx) = event_channel();

        assert_eq!(server.register(user("1", "alice"), tx).await.unwrap(), 1);
        assert!(server.is_connected(&UserId::from("1")).await);
        assert_eq!(server.list_users().await, vec!["alice".to_string()]);
        assert_eq!(server.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_over_capacity() {
        let server = ChatServer::new(1);
        let (tx1, _rx1) = event_channel();
        let (tx2, _rx2) = event_channel();

        server.register(user("1", "alice"), tx1).await.unwrap();
        let err = server.register(user("2", "bob"), tx2).await.unwrap_err();

        assert!(matches!(err, AppError::ServerFull { max_connections: 1 }));
        assert_eq!(server.connected_count().await, 1);
        assert_eq!(server.user_count().await, 1);
        assert!(server.find_user(&UserId::from("2")).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_holds_under_concurrent_joins() {
        let server = Arc::new(ChatServer::new(5));
        let mut handles = Vec::new();
        let mut receivers = Vec::new();

        for i in 0..20 {
            let (tx, rx) = event_channel();
            receivers.push(rx);
            let server = server.clone();
            handles.push(tokio::spawn(async move {
                server
                    .register(user(&i.to_string(), &format!("user{}", i)), tx)
                    .await
                    .is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 5);
        assert_eq!(server.connected_count().await, 5);
        assert_eq!(server.user_count().await, 5);
    }

    #[tokio::test]
    async fn test_deregister_idempotent() {
        let server = ChatServer::new(10);
        let (tx, _rx) = event_channel();
        let alice_id = UserId::from("1");

        server.register(user("1", "alice"), tx).await.unwrap();
        assert_eq!(server.deregister(&alice_id).await, Some(user("1", "alice")));
        assert_eq!(server.deregister(&alice_id).await, None);
        assert_eq!(server.deregister(&UserId::from("never")).await, None);

        assert_eq!(server.connected_count().await, 0);
        assert_eq!(server.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_deregister_sink_only_removes_matching_channel() {
        let server = ChatServer::new(10);
        let (first, _rx1) = event_channel();
        let (second, _rx2) = event_channel();
        let alice_id = UserId::from("1");

        server.register(user("1", "alice"), first.clone()).await.unwrap();
        server.register(user("1", "alice"), second.clone()).await.unwrap();

        assert_eq!(server.deregister_sink(&alice_id, &first).await, None);
        assert!(server.is_connected(&alice_id).await);

        assert_eq!(
            server.deregister_sink(&alice_id, &second).await,
            Some(user("1", "alice"))
        );
        assert!(!server.is_connected(&alice_id).await);
        assert_eq!(server.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_sink_once() {
        let server = ChatServer::new(10);
        let mut receivers = Vec::new();
        for i in 0..3 {
            let (tx, rx) = event_channel();
            server
                .register(user(&i.to_string(), &format!("user{}", i)), tx)
                .await
                .unwrap();
            receivers.push(rx);
        }

        let event = ChatEvent::UserJoined(user("0", "user0"));
        assert_eq!(server.broadcast(event.clone()).await, 3);

        for rx in &mut receivers {
            assert_eq!(rx.recv().await, Some(event.clone()));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_broken_sink() {
        let server = ChatServer::new(10);
        let (tx1, rx1) = event_channel();
        let (tx2, mut rx2) = event_channel();

        server.register(user("1", "alice"), tx1).await.unwrap();
        server.register(user("2", "bob"), tx2).await.unwrap();
        drop(rx1);

        let event = ChatEvent::UserLeft(user("3", "carol"));
        assert_eq!(server.broadcast(event.clone()).await, 1);
        assert_eq!(rx2.recv().await, Some(event));

        // Broken sinks are only removed by their session
        assert_eq!(server.connected_count().await, 2);
    }

    #[tokio::test]
    async fn test_join_only_touches_directory() {
        let server = ChatServer::new(10);
        let alice = server.join("alice").await;

        assert_eq!(alice.name, "alice");
        assert!(!alice.id.is_empty());
        assert_eq!(server.find_user(&alice.id).await, Some(alice));
        assert_eq!(server.connected_count().await, 0);
        assert!(server.list_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_issues_distinct_ids() {
        let server = ChatServer::new(10);
        let a = server.join("alice").await;
        let b = server.join("alice").await;
        assert_ne!(a.id, b.id);
        assert_eq!(server.user_count().await, 2);
    }

    #[tokio::test]
    async fn test_send_message_known_and_unknown_sender() {
        let server = ChatServer::new(10);
        let alice = server.join("alice").await;

        let known = server.send_message(&alice.id, "hello".into()).await;
        assert_eq!(known.sender, Some(alice));

        let unknown = server
            .send_message(&UserId::from("ghost"), "boo".into())
            .await;
        assert!(unknown.sender.is_none());

        assert_eq!(server.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn test_message_log_grows_with_unique_ids() {
        let server = ChatServer::new(10);
        let alice = server.join("alice").await;

        for i in 0..50 {
            server.send_message(&alice.id, format!("m{}", i)).await;
            let streamed = Message::new(
                crate::types::MessageId("client-chosen".into()),
                Some(alice.clone()),
                "s",
            );
            server.ingest_message(streamed).await;
            assert_eq!(server.messages().await.len(), (i + 1) * 2);
        }

        let ids: HashSet<_> = server.messages().await.into_iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 100);
    }

    #[tokio::test]
    async fn test_list_users_empty() {
        let server = ChatServer::new(10);
        assert!(server.list_users().await.is_empty());
    }
}
