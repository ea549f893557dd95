//! Registry entry for a connected stream client
//!
//! Pairs the joined user with the sink feeding their WebSocket writer.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ChatEvent;
use crate::model::User;

/// Server → Client event sink
pub type EventSink = mpsc::Sender<ChatEvent>;

/// Capacity of each client's outbound channel
pub const SINK_BUFFER_SIZE: usize = 64;

/// Create a sink and the receiver its writer task drains
pub fn event_channel() -> (EventSink, mpsc::Receiver<ChatEvent>) {
    mpsc::channel(SINK_BUFFER_SIZE)
}

/// Connected client information
#[derive(Debug, Clone)]
pub struct Client {
    /// The user who completed the join handshake
    pub user: User,
    /// Server → Client event channel
    pub sender: EventSink,
}

impl Client {
    pub fn new(user: User, sender: EventSink) -> Self {
        Self { user, sender }
    }

    /// Push an event without waiting
    ///
    /// Fails when the client is gone or its buffer is full; the event
    /// is lost for this client in both cases.
    pub fn try_send(&self, event: ChatEvent) -> Result<(), SendError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Display name of the connected user
    pub fn display_name(&self) -> &str {
        &self.user.name
    }
}
