//! Text signaling messages exchanged between two peers in a room.
//!
//! Every message is a single text frame of the form `<KIND> <body>`. The
//! relay forwards these frames untouched and only ever originates the two
//! [`PeerState`] messages and [`ROOM_FULL_NOTICE`]. Peers use
//! [`SignalMessage::parse`] to interpret what they receive.

use std::fmt;
use std::str::FromStr;

/// Maximum number of peers a room can hold.
pub const MAX_PEERS_PER_ROOM: usize = 2;

/// Text sent to a peer that tries to join a room that already has two peers.
pub const ROOM_FULL_NOTICE: &str = "Room is full. Only 2 peers are allowed.";

/// Errors returned when parsing a signaling message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The message contained no text.
    #[error("empty signaling message")]
    Empty,
    /// The leading word is not a known message kind.
    #[error("unknown signaling message kind: {0}")]
    UnknownKind(String),
}

/// The kind of a signaling message, i.e. its leading word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Room state change (`STATE Ready`, `STATE Disconnected`).
    State,
    /// SDP offer.
    Offer,
    /// SDP answer.
    Answer,
    /// ICE candidate.
    Ice,
}

impl SignalKind {
    /// Returns the wire keyword for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::State => "STATE",
            Self::Offer => "OFFER",
            Self::Answer => "ANSWER",
            Self::Ice => "ICE",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATE" => Ok(Self::State),
            "OFFER" => Ok(Self::Offer),
            "ANSWER" => Ok(Self::Answer),
            "ICE" => Ok(Self::Ice),
            "" => Err(ParseError::Empty),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Room states announced by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Both peers are present; the handshake can start.
    Ready,
    /// The other peer left the room.
    Disconnected,
}

impl PeerState {
    /// Returns the body used in a `STATE` message.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Disconnected => "Disconnected",
        }
    }

    /// Returns the full text frame announcing this state.
    #[must_use]
    pub fn message(self) -> String {
        SignalMessage::new(SignalKind::State, self.as_str()).to_string()
    }
}

/// A parsed signaling message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMessage {
    /// Leading keyword.
    pub kind: SignalKind,
    /// Everything after the first space, preserved exactly.
    pub body: String,
}

impl SignalMessage {
    /// Creates a message from a kind and a body.
    pub fn new(kind: SignalKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    /// Parses a text frame.
    ///
    /// The frame is split on the first ASCII space; the head must be a known
    /// kind and the remainder is kept verbatim as the body. A frame with no
    /// space is a kind with an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Empty`] for an empty frame and
    /// [`ParseError::UnknownKind`] if the head is not a known keyword.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (head, body) = text.split_once(' ').unwrap_or((text, ""));
        let kind = head.parse()?;
        Ok(Self::new(kind, body))
    }

    /// Returns the announced state if this is a relay-originated `STATE` message.
    #[must_use]
    pub fn peer_state(&self) -> Option<PeerState> {
        if self.kind != SignalKind::State {
            return None;
        }
        match self.body.as_str() {
            "Ready" => Some(PeerState::Ready),
            "Disconnected" => Some(PeerState::Disconnected),
            _ => None,
        }
    }
}

impl FromStr for SignalMessage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SignalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            f.write_str(self.kind.as_str())
        } else {
            write!(f, "{} {}", self.kind, self.body)
        }
    }
}
