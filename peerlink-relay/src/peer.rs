//! Outbound handle for one connected peer.
//!
//! The registry never touches a socket directly. Each peer gets a
//! [`PeerSender`] backed by an unbounded channel; a writer task owned by the
//! connection drains the channel into the WebSocket. Pushing onto the channel
//! never blocks, so sends made while the registry lock is held cannot stall
//! other rooms.

use tokio::sync::mpsc;

/// One queued instruction for a peer's socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Deliver a text frame.
    Text(String),
    /// Send a close frame and stop writing.
    Close,
}

/// Errors raised when a peer can no longer be reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    /// The peer's writer has shut down.
    #[error("peer disconnected")]
    Disconnected,
}

/// Cloneable sending half of a peer's outbound queue.
#[derive(Debug, Clone)]
pub struct PeerSender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PeerSender {
    /// Wraps an existing channel sender.
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    /// Creates a handle together with the receiver its writer should drain.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queues a text frame for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Disconnected`] if the writer has gone away.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), PeerError> {
        self.tx
            .send(Outbound::Text(text.into()))
            .map_err(|_| PeerError::Disconnected)
    }

    /// Queues a close after anything already queued.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Disconnected`] if the writer has gone away.
    pub fn close(&self) -> Result<(), PeerError> {
        self.tx
            .send(Outbound::Close)
            .map_err(|_| PeerError::Disconnected)
    }

    /// Returns `true` once the writer side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
