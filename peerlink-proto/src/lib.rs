//! Shared signaling vocabulary for `PeerLink` peers and the relay.

pub mod signal;
