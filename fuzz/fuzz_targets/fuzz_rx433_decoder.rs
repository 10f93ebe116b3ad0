//! Fuzz target: `Rx433Receiver::feed`
//!
//! Interprets the input as little-endian pulse durations and drives them
//! through the full receive path (decoder, repeat filter, frame layout).
//! Asserts that it never panics and that every emitted signal fits the
//! 20-bit address / 4-bit command layout.
//!
//! cargo fuzz run fuzz_rx433_decoder

#![no_main]

use homealarm::alarm::SensorKind;
use homealarm::sources::rx433::{FrameLayout, Rx433Receiver};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut receiver = Rx433Receiver::new(FrameLayout::Addr20Cmd4, 500);

    for (i, chunk) in data.chunks_exact(4).enumerate() {
        let duration = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        // Advance the clock so the repeat filter sees both bursts and gaps.
        let now_ms = (i as u32).wrapping_mul(97);
        if let Some(signal) = receiver.feed(duration, now_ms) {
            assert_eq!(signal.kind, SensorKind::Wireless433);
            assert!(signal.address < (1 << 20), "address exceeds 20 bits");
            assert!(signal.code < 16, "command exceeds 4 bits");
        }
    }
});
