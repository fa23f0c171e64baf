//! Room registry for the signaling relay.
//!
//! Maintains the in-memory mapping from room identifier to the (at most two)
//! peers currently inside it. Rooms are created by the first join and
//! removed when the last peer leaves, so the registry never holds an empty
//! room.
//!
//! Join, leave and relay all run under one registry-wide lock. Every
//! notification is a push onto a [`PeerSender`] queue, so the lock is never
//! held across socket I/O.
//!
//! Room entries are ephemeral and lost on restart.

use std::collections::HashMap;

use parking_lot::Mutex;
use peerlink_proto::signal::{MAX_PEERS_PER_ROOM, PeerState, ROOM_FULL_NOTICE};

use crate::peer::PeerSender;

/// Successful result of [`RoomRegistry::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The peer is alone in the room and waits for a partner.
    Waiting,
    /// The room now holds two peers and both were sent `STATE Ready`.
    Ready,
}

impl JoinOutcome {
    /// Number of peers in the room right after the join.
    #[must_use]
    pub const fn occupancy(self) -> usize {
        match self {
            Self::Waiting => 1,
            Self::Ready => MAX_PEERS_PER_ROOM,
        }
    }
}

/// Errors that can occur when joining a room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// The room already holds two peers.
    #[error("room {room_id} is full (max {MAX_PEERS_PER_ROOM} peers)")]
    RoomFull {
        /// The room that rejected the peer.
        room_id: String,
    },
}

/// Result of [`RoomRegistry::leave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The peer was not in the room, or the room does not exist.
    NotPresent,
    /// The peer left; `remaining` peers were told `STATE Disconnected`.
    Left {
        /// Peers still in the room.
        remaining: usize,
    },
    /// The peer was the last one and the room was deleted.
    RoomClosed,
}

/// A single room's membership.
#[derive(Debug, Default)]
struct Room {
    peers: HashMap<String, PeerSender>,
}

impl Room {
    /// Queues `text` for every peer in the room except `skip`.
    ///
    /// Returns how many peers accepted the message.
    fn broadcast(&self, room_id: &str, text: &str, skip: Option<&str>) -> usize {
        let mut delivered = 0;
        for (peer_id, peer) in &self.peers {
            if Some(peer_id.as_str()) == skip {
                continue;
            }
            // An unreachable peer's own session runs `leave` when its reader ends.
            if peer.is_closed() {
                tracing::debug!(room_id = %room_id, peer_id = %peer_id, "skipping closed peer");
                continue;
            }
            match peer.send_text(text) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(room_id = %room_id, peer_id = %peer_id, error = %e, "dropping message for unreachable peer");
                }
            }
        }
        delivered
    }
}

/// In-memory registry of rooms and their occupants.
///
/// Thread-safe via a single [`Mutex`]. Construct one per server and share it
/// behind an `Arc`.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Room>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Creates a new, empty room registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Adds a peer to a room, creating the room if needed.
    ///
    /// When the join makes the room full, both peers are sent `STATE Ready`.
    /// A peer joining a room that already has two occupants is sent
    /// [`ROOM_FULL_NOTICE`] and a close; the room is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::RoomFull`] if the room already holds two peers.
    pub fn join(
        &self,
        room_id: &str,
        peer_id: &str,
        handle: PeerSender,
    ) -> Result<JoinOutcome, JoinError> {
        let mut rooms = self.rooms.lock();

        if !rooms.contains_key(room_id) {
            tracing::info!(room_id = %room_id, "room created");
        }
        let room = rooms.entry(room_id.to_string()).or_default();

        if room.peers.len() >= MAX_PEERS_PER_ROOM {
            drop(rooms);
            tracing::info!(room_id = %room_id, peer_id = %peer_id, "room is full, rejecting peer");
            if handle.send_text(ROOM_FULL_NOTICE).is_err() || handle.close().is_err() {
                tracing::debug!(room_id = %room_id, peer_id = %peer_id, "rejected peer already gone");
            }
            return Err(JoinError::RoomFull {
                room_id: room_id.to_string(),
            });
        }

        room.peers.insert(peer_id.to_string(), handle);
        let occupancy = room.peers.len();
        tracing::info!(room_id = %room_id, peer_id = %peer_id, occupancy, "peer joined room");

        if occupancy < MAX_PEERS_PER_ROOM {
            return Ok(JoinOutcome::Waiting);
        }

        tracing::info!(room_id = %room_id, "room ready");
        room.broadcast(room_id, &PeerState::Ready.message(), None);
        drop(rooms);

        Ok(JoinOutcome::Ready)
    }

    /// Forwards `message` verbatim to every occupant of the room except the
    /// sender.
    ///
    /// An unknown room is a silent no-op. Returns the number of peers the
    /// message was queued for.
    pub fn relay(&self, room_id: &str, sender_id: &str, message: &str) -> usize {
        let rooms = self.rooms.lock();
        let Some(room) = rooms.get(room_id) else {
            tracing::debug!(room_id = %room_id, peer_id = %sender_id, "relay to unknown room ignored");
            return 0;
        };

        let delivered = room.broadcast(room_id, message, Some(sender_id));
        drop(rooms);

        tracing::debug!(
            room_id = %room_id,
            peer_id = %sender_id,
            len = message.len(),
            delivered,
            "relayed message"
        );
        delivered
    }

    /// Removes a peer from a room.
    ///
    /// Every remaining occupant is sent `STATE Disconnected`, and the room is
    /// deleted once empty. Leaving a room the peer is not in does nothing, so
    /// calling this twice for the same peer has the effect of calling it once.
    pub fn leave(&self, room_id: &str, peer_id: &str) -> LeaveOutcome {
        let mut rooms = self.rooms.lock();
        let Some(room) = rooms.get_mut(room_id) else {
            return LeaveOutcome::NotPresent;
        };
        if room.peers.remove(peer_id).is_none() {
            return LeaveOutcome::NotPresent;
        }

        tracing::info!(room_id = %room_id, peer_id = %peer_id, "peer left room");
        room.broadcast(room_id, &PeerState::Disconnected.message(), None);

        let remaining = room.peers.len();
        if remaining > 0 {
            return LeaveOutcome::Left { remaining };
        }

        rooms.remove(room_id);
        drop(rooms);
        tracing::info!(room_id = %room_id, "room empty, deleted");
        LeaveOutcome::RoomClosed
    }

    /// Number of rooms currently held.
    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Returns `true` if a room with this identifier exists.
    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.lock().contains_key(room_id)
    }

    /// Returns the sorted peer identifiers in a room, if it exists.
    pub fn occupants(&self, room_id: &str) -> Option<Vec<String>> {
        let rooms = self.rooms.lock();
        let mut peers: Vec<String> = rooms.get(room_id)?.peers.keys().cloned().collect();
        drop(rooms);
        peers.sort();
        Some(peers)
    }
}
