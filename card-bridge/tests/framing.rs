//! Property-based tests for host frame reassembly.

use card_bridge::cell::Targets;
use card_bridge::protocol::{FrameParser, OUTPUT_FRAME_LEN, SYNC_HOST_TO_DEVICE};
use proptest::prelude::*;

fn targets() -> impl Strategy<Value = Targets> {
    (any::<[bool; 2]>(), any::<[i16; 2]>(), any::<[i16; 2]>())
        .prop_map(|(pulse, audio, cv)| Targets { pulse, audio, cv })
}

/// Frames whose payload never contains the sync byte.
fn clean_targets() -> impl Strategy<Value = Targets> {
    targets().prop_filter("payload contains sync", |t| {
        !t.encode()[1..].contains(&SYNC_HOST_TO_DEVICE)
    })
}

fn feed(parser: &mut FrameParser, bytes: &[u8]) -> Vec<Targets> {
    bytes.iter().filter_map(|&b| parser.push(b)).collect()
}

proptest! {
    /// A clean frame decodes to the targets it was built from.
    #[test]
    fn frame_round_trip(t in clean_targets()) {
        let mut parser = FrameParser::new();
        prop_assert_eq!(feed(&mut parser, &t.encode()), vec![t]);
    }

    /// Leading garbage is skipped.
    #[test]
    fn resync_after_garbage(
        garbage in proptest::collection::vec(any::<u8>().prop_filter("sync", |b| *b != SYNC_HOST_TO_DEVICE), 0..64),
        t in clean_targets(),
    ) {
        let mut parser = FrameParser::new();
        prop_assert!(feed(&mut parser, &garbage).is_empty());
        prop_assert_eq!(feed(&mut parser, &t.encode()), vec![t]);
    }

    /// A truncated frame is abandoned when the next sync arrives.
    #[test]
    fn mid_frame_sync_restarts(
        first in targets(),
        cut in 1..OUTPUT_FRAME_LEN,
        t in clean_targets(),
    ) {
        let mut parser = FrameParser::new();
        let head = first.encode();
        let _ = feed(&mut parser, &head[..cut]);
        prop_assert_eq!(feed(&mut parser, &t.encode()), vec![t]);
    }

    /// Arbitrary input never leaves a full frame pending.
    #[test]
    fn pending_stays_below_frame_len(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut parser = FrameParser::new();
        for b in bytes {
            parser.push(b);
            prop_assert!(parser.pending() < OUTPUT_FRAME_LEN);
        }
    }
}
