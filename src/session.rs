//! Per-connection chat session
//!
//! Drives one client's inbound event stream through the
//! `Unjoined -> Active -> Terminated` state machine, mutating the shared
//! registry and triggering broadcasts. The session owns the cleanup of
//! its registration when the stream ends, however it ends.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::client::EventSink;
use crate::error::AppError;
use crate::message::ChatEvent;
use crate::server::{ChatServer, DisconnectPolicy};
use crate::types::UserId;

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the client's `UserJoined`
    Unjoined,
    /// Registered under the contained identity
    Active(UserId),
    /// The client announced its exit; further events are ignored.
    /// Keeps the identity the session registered under.
    Terminated(UserId),
}

/// One client's chat session
pub struct Session {
    server: Arc<ChatServer>,
    sink: EventSink,
    state: SessionState,
}

impl Session {
    pub fn new(server: Arc<ChatServer>, sink: EventSink) -> Self {
        Self {
            server,
            sink,
            state: SessionState::Unjoined,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply one inbound event
    ///
    /// Fails only when the join is rejected for capacity; the session
    /// must then end without cleanup since nothing was registered.
    pub async fn handle_event(&mut self, event: ChatEvent) -> Result<(), AppError> {
        match (&self.state, event) {
            (SessionState::Unjoined, ChatEvent::UserJoined(user)) => {
                let total = self.server.register(user.clone(), self.sink.clone()).await?;
                info!("User {} joined (ID: {}, total: {})", user.name, user.id, total);

                self.state = SessionState::Active(user.id.clone());
                self.server.broadcast(ChatEvent::UserJoined(user)).await;
            }
            (SessionState::Unjoined, event) => {
                warn!("Ignoring {} event before join", event.kind());
            }
            (SessionState::Active(own_id), ChatEvent::UserLeft(user)) => {
                let own_id = own_id.clone();
                self.server.deregister(&user.id).await;
                info!(
                    "User {} left (ID: {}, total: {})",
                    user.name,
                    user.id,
                    self.server.connected_count().await
                );

                self.state = SessionState::Terminated(own_id);
                self.server.broadcast(ChatEvent::UserLeft(user)).await;
            }
            (SessionState::Active(_), ChatEvent::Message(msg)) => {
                debug!("Message from {}: {}", msg.sender_name(), msg.content);
                let msg = self.server.ingest_message(msg).await;
                self.server.broadcast(ChatEvent::Message(msg)).await;
            }
            (SessionState::Active(own_id), ChatEvent::UserJoined(user)) => {
                warn!(
                    "Ignoring repeated join as {} (ID: {}) from session of {}",
                    user.name, user.id, own_id
                );
            }
            (SessionState::Terminated(_), event) => {
                debug!("Ignoring {} event after leave", event.kind());
            }
        }
        Ok(())
    }

    /// Clean up after the inbound stream ended
    ///
    /// Removes this session's own registration, if it still holds one.
    /// A stream that ends without leaving is announced when the server's
    /// policy asks for it; one that already left is removed quietly.
    pub async fn finish(self) {
        let (user_id, left) = match self.state {
            SessionState::Unjoined => return,
            SessionState::Active(user_id) => (user_id, false),
            SessionState::Terminated(user_id) => (user_id, true),
        };

        let Some(user) = self.server.deregister_sink(&user_id, &self.sink).await else {
            return;
        };

        if left {
            debug!(
                "Removed stale registration of {} (ID: {}) after leave",
                user.name, user.id
            );
            return;
        }

        info!(
            "User {} disconnected unexpectedly (ID: {}, total: {})",
            user.name,
            user.id,
            self.server.connected_count().await
        );

        match self.server.disconnect_policy() {
            DisconnectPolicy::Announce => {
                self.server.broadcast(ChatEvent::UserLeft(user)).await;
            }
            DisconnectPolicy::Silent => {}
        }
    }
}

/// Run a session over an inbound event stream until it ends
///
/// An `Err` item or the end of the stream is treated as a disconnect.
/// Returns `AppError::ServerFull` if the join was rejected.
pub async fn run_session<S>(
    server: Arc<ChatServer>,
    inbound: S,
    sink: EventSink,
) -> Result<(), AppError>
where
    S: Stream<Item = Result<ChatEvent, AppError>>,
{
    tokio::pin!(inbound);
    let mut session = Session::new(server, sink);

    while let Some(next) = inbound.next().await {
        match next {
            Ok(event) => session.handle_event(event).await?,
            Err(e) => {
                debug!("Inbound stream ended: {}", e);
                break;
            }
        }
    }

    session.finish().await;
    Ok(())
}
