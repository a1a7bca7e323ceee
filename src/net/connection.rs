use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::game::constants::net::OUTBOX_CAPACITY;
use crate::game::state::PlayerId;
use crate::net::framing::Frame;

/// Identifies one live client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The peer can no longer keep up (queue full) or is gone (queue closed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("peer lost")]
pub struct PeerLost;

/// Sending half of a connection's bounded outbound queue.
///
/// Hub code only ever pushes without waiting; the connection's writer task
/// drains the other half onto the network stream.
#[derive(Debug, Clone)]
pub struct Outbox(mpsc::Sender<Frame>);

pub type OutboxReceiver = mpsc::Receiver<Frame>;

impl Outbox {
    /// Outbox with the default depth
    pub fn new() -> (Self, OutboxReceiver) {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self(tx), rx)
    }

    /// Queue a frame. Never waits.
    pub fn push(&self, frame: Frame) -> Result<(), PeerLost> {
        match self.0.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => Err(PeerLost),
        }
    }
}

/// A connection bound to a player identity
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub player_id: PlayerId,
    pub outbox: Outbox,
}
