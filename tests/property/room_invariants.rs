#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Property-based tests for room registry invariants.
//!
//! Drives a `RoomRegistry` with arbitrary sequences of join, leave and relay
//! operations over a handful of rooms and peers, checking after every step
//! against a simple model:
//! 1. No stored room is empty and none holds more than two peers.
//! 2. A rejected join leaves membership unchanged and the peer receives the
//!    full-room notice followed by a close.
//! 3. `STATE Ready` is sent exactly when a room reaches two peers.
//! 4. `STATE Disconnected` is sent to the survivor exactly once per leave.
//! 5. Relayed text reaches the other occupant only.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use peerlink_proto::signal::{MAX_PEERS_PER_ROOM, ROOM_FULL_NOTICE};
use peerlink_relay::peer::{Outbound, PeerSender};
use peerlink_relay::rooms::{JoinError, JoinOutcome, LeaveOutcome, RoomRegistry};
use proptest::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;

const ROOMS: [&str; 3] = ["r0", "r1", "r2"];
const PEERS: usize = 6;

/// One registry operation.
#[derive(Debug, Clone)]
enum Op {
    Join { room: usize, peer: usize },
    Leave { room: usize, peer: usize },
    Relay { room: usize, peer: usize },
}

/// Strategy for generating arbitrary registry operations.
fn arb_op() -> impl Strategy<Value = Op> {
    let room = 0..ROOMS.len();
    let peer = 0..PEERS;
    prop_oneof![
        (room.clone(), peer.clone()).prop_map(|(room, peer)| Op::Join { room, peer }),
        (room.clone(), peer.clone()).prop_map(|(room, peer)| Op::Leave { room, peer }),
        (room, peer).prop_map(|(room, peer)| Op::Relay { room, peer }),
    ]
}

fn peer_name(peer: usize) -> String {
    format!("peer-{peer}")
}

fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn text(s: &str) -> Outbound {
    Outbound::Text(s.to_string())
}

/// Harness holding the registry, a model of membership, and every peer's
/// outbound receiver.
struct Harness {
    registry: RoomRegistry,
    model: BTreeMap<&'static str, BTreeSet<String>>,
    /// Room each peer currently occupies; a peer is in at most one room.
    location: HashMap<usize, usize>,
    receivers: HashMap<usize, UnboundedReceiver<Outbound>>,
    relay_counter: usize,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: RoomRegistry::new(),
            model: BTreeMap::new(),
            location: HashMap::new(),
            receivers: HashMap::new(),
            relay_counter: 0,
        }
    }

    fn partner_of(&self, room: usize, peer: usize) -> Option<usize> {
        self.location
            .iter()
            .find(|(other, r)| **r == room && **other != peer)
            .map(|(other, _)| *other)
    }

    fn apply(&mut self, op: &Op) -> Result<(), TestCaseError> {
        match *op {
            Op::Join { room, peer } => self.join(room, peer),
            Op::Leave { room, peer } => self.leave(room, peer),
            Op::Relay { room, peer } => self.relay(room, peer),
        }
    }

    fn join(&mut self, room: usize, peer: usize) -> Result<(), TestCaseError> {
        // A peer joins at most one room at a time.
        if self.location.contains_key(&peer) {
            return Ok(());
        }
        let room_id = ROOMS[room];
        let (handle, mut rx) = PeerSender::channel();
        let occupants = self.model.get(room_id).map_or(0, BTreeSet::len);

        let result = self.registry.join(room_id, &peer_name(peer), handle);

        if occupants >= MAX_PEERS_PER_ROOM {
            let is_full = matches!(result, Err(JoinError::RoomFull { .. }));
            prop_assert!(is_full, "expected RoomFull, got {:?}", result);
            prop_assert_eq!(drain(&mut rx), vec![text(ROOM_FULL_NOTICE), Outbound::Close]);
            return Ok(());
        }

        let partner = self.partner_of(room, peer);
        self.model
            .entry(room_id)
            .or_default()
            .insert(peer_name(peer));
        self.location.insert(peer, room);

        if let Some(partner) = partner {
            prop_assert_eq!(result, Ok(JoinOutcome::Ready));
            prop_assert_eq!(drain(&mut rx), vec![text("STATE Ready")]);
            let partner_rx = self.receivers.get_mut(&partner).unwrap();
            prop_assert_eq!(drain(partner_rx), vec![text("STATE Ready")]);
        } else {
            prop_assert_eq!(result, Ok(JoinOutcome::Waiting));
            prop_assert!(drain(&mut rx).is_empty());
        }
        self.receivers.insert(peer, rx);
        Ok(())
    }

    fn leave(&mut self, room: usize, peer: usize) -> Result<(), TestCaseError> {
        let room_id = ROOMS[room];
        let outcome = self.registry.leave(room_id, &peer_name(peer));

        if self.location.get(&peer) != Some(&room) {
            prop_assert_eq!(outcome, LeaveOutcome::NotPresent);
            return Ok(());
        }

        let partner = self.partner_of(room, peer);
        self.location.remove(&peer);
        self.receivers.remove(&peer);
        let members = self.model.get_mut(room_id).unwrap();
        members.remove(&peer_name(peer));

        if let Some(partner) = partner {
            prop_assert_eq!(outcome, LeaveOutcome::Left { remaining: 1 });
            let partner_rx = self.receivers.get_mut(&partner).unwrap();
            prop_assert_eq!(drain(partner_rx), vec![text("STATE Disconnected")]);
        } else {
            prop_assert_eq!(outcome, LeaveOutcome::RoomClosed);
            self.model.remove(room_id);
        }
        Ok(())
    }

    fn relay(&mut self, room: usize, peer: usize) -> Result<(), TestCaseError> {
        // Only members send; the transport never relays for a non-member.
        if self.location.get(&peer) != Some(&room) {
            return Ok(());
        }
        self.relay_counter += 1;
        let message = format!("ICE candidate-{}", self.relay_counter);
        let delivered = self.registry.relay(ROOMS[room], &peer_name(peer), &message);

        let own_rx = self.receivers.get_mut(&peer).unwrap();
        prop_assert!(drain(own_rx).is_empty());

        if let Some(partner) = self.partner_of(room, peer) {
            prop_assert_eq!(delivered, 1);
            let partner_rx = self.receivers.get_mut(&partner).unwrap();
            prop_assert_eq!(drain(partner_rx), vec![text(&message)]);
        } else {
            prop_assert_eq!(delivered, 0);
        }
        Ok(())
    }

    fn check_invariants(&self) -> Result<(), TestCaseError> {
        prop_assert_eq!(self.registry.room_count(), self.model.len());
        for room_id in ROOMS {
            match self.model.get(room_id) {
                Some(members) => {
                    let occupants = self.registry.occupants(room_id).unwrap();
                    prop_assert!(!occupants.is_empty());
                    prop_assert!(occupants.len() <= MAX_PEERS_PER_ROOM);
                    let expected: Vec<String> = members.iter().cloned().collect();
                    prop_assert_eq!(occupants, expected);
                }
                None => prop_assert!(!self.registry.contains_room(room_id)),
            }
        }
        Ok(())
    }
}

proptest! {
    #[test]
    fn registry_matches_model(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op)?;
            harness.check_invariants()?;
        }
    }

    #[test]
    fn draining_every_peer_empties_registry(ops in prop::collection::vec(arb_op(), 1..100)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op)?;
        }
        let present: Vec<(usize, usize)> =
            harness.location.iter().map(|(peer, room)| (*room, *peer)).collect();
        for (room, peer) in present {
            harness.leave(room, peer)?;
        }
        prop_assert_eq!(harness.registry.room_count(), 0);
    }
}
