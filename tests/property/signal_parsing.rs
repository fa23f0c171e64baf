//! Property-based tests for signaling message parsing.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never causes a panic in `SignalMessage::parse`.
//! 2. Any known kind followed by any body parses back to the same body and
//!    re-renders to the original text.

use peerlink_proto::signal::{SignalKind, SignalMessage};
use proptest::prelude::*;

/// Strategy for generating one of the four signaling kinds.
fn arb_kind() -> impl Strategy<Value = SignalKind> {
    prop_oneof![
        Just(SignalKind::State),
        Just(SignalKind::Offer),
        Just(SignalKind::Answer),
        Just(SignalKind::Ice),
    ]
}

proptest! {
    #[test]
    fn parse_never_panics(text in ".{0,512}") {
        let _ = SignalMessage::parse(&text);
    }

    #[test]
    fn body_is_preserved(kind in arb_kind(), body in ".{1,512}") {
        let text = format!("{kind} {body}");
        let msg = SignalMessage::parse(&text).unwrap();
        prop_assert_eq!(msg.kind, kind);
        prop_assert_eq!(&msg.body, &body);
        prop_assert_eq!(msg.to_string(), text);
    }
}
