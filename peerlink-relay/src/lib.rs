//! `PeerLink` signaling relay library.
//!
//! Exposes the relay server for use in tests and embedding. The relay
//! accepts one WebSocket per peer on `/rtc/{room_id}`, pairs at most two
//! peers per room, and forwards their signaling text to each other.

pub mod config;
pub mod peer;
pub mod relay;
pub mod rooms;
