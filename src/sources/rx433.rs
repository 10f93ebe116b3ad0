//! 433 MHz OOK receiver.
//!
//! ## Signal path
//!
//! ```text
//!  RX433 GPIO edge ─▶ pulse_isr_handler(duration) ─▶ PULSE_QUEUE (lock-free)
//!                                                        │ drain()
//!                                                        ▼
//!        PulseDecoder ─▶ RepeatFilter ─▶ FrameLayout::split ─▶ InputSignal
//! ```
//!
//! The decoder understands the common fixed-code "protocol 1" used by
//! cheap PIR, smoke and door sensors and key fobs:
//!
//! | Symbol | High | Low |
//! |--------|------|-----|
//! | sync   | 1 T  | 31 T|
//! | 0      | 1 T  | 3 T |
//! | 1      | 3 T  | 1 T |
//!
//! `T` is recovered from the sync gap of every frame, so transmitters with
//! slightly different clocks decode equally well.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::mpmc::MpMcQueue;
use log::debug;

use super::{RawInput, SignalSource};
use crate::error::SignalError;
use crate::events::InputSignal;

/// Gaps longer than this separate two frames (microseconds).
const SEPARATION_LIMIT_US: u32 = 4_300;
/// Sync gap length in pulse units.
const SYNC_FACTOR: u32 = 31;
/// Accepted deviation from the ideal pulse length, percent.
const TOLERANCE_PCT: u32 = 60;
/// One sync, up to 32 data bits, the trailing sync pulse.
const MAX_CHANGES: usize = 67;
/// Frames shorter than this are noise.
const MIN_BITS: u8 = 4;
/// Edges closer than this are RF noise, well below the shortest symbol
/// half the decoder accepts.
const GLITCH_US: u32 = 80;
/// One worker tick (10 ms) of back-to-back 140 us symbol halves, with room
/// to spare.
const PULSE_QUEUE_DEPTH: usize = 128;

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rx433Frame {
    pub value: u32,
    pub bits: u8,
    /// Recovered pulse length `T`.
    pub pulse_us: u32,
}

// ── Pulse capture (ISR side) ──────────────────────────────────

/// Raw edge-to-edge durations captured by the receiver ISR.
static PULSE_QUEUE: MpMcQueue<u32, PULSE_QUEUE_DEPTH> = MpMcQueue::new();
/// Pulses lost on a full queue since the last drain.
static PULSES_DROPPED: AtomicU32 = AtomicU32::new(0);

/// ISR handler: call on every edge of the receiver output with the time
/// since the previous edge.  Glitches are discarded here.  A full queue
/// drops the pulse; the decoder then fails that frame and resynchronizes
/// on the next sync gap.
pub fn pulse_isr_handler(duration_us: u32) {
    if duration_us < GLITCH_US {
        return;
    }
    if PULSE_QUEUE.enqueue(duration_us).is_err() {
        PULSES_DROPPED.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Decoder ───────────────────────────────────────────────────

#[derive(Default)]
pub struct PulseDecoder {
    timings: heapless::Vec<u32, MAX_CHANGES>,
}

impl PulseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one edge-to-edge duration.  Returns a frame when a sync gap
    /// closes a valid transmission.
    pub fn feed(&mut self, duration_us: u32) -> Option<Rx433Frame> {
        if duration_us > SEPARATION_LIMIT_US {
            let frame = self.decode();
            self.timings.clear();
            // The gap is the sync of the next frame.
            let _ = self.timings.push(duration_us);
            return frame;
        }
        if self.timings.is_empty() {
            // Waiting for the first sync gap.
            return None;
        }
        if self.timings.push(duration_us).is_err() {
            self.timings.clear();
        }
        None
    }

    fn decode(&self) -> Option<Rx433Frame> {
        let len = self.timings.len();
        // sync + at least MIN_BITS pairs + trailing sync pulse
        if len < 2 + 2 * MIN_BITS as usize {
            return None;
        }
        let pulse_us = self.timings[0] / SYNC_FACTOR;
        if pulse_us == 0 {
            return None;
        }
        let tolerance = (u64::from(pulse_us) * u64::from(TOLERANCE_PCT) / 100) as u32;
        let near = |actual: u32, units: u32| actual.abs_diff(pulse_us * units) <= tolerance;

        let mut value: u32 = 0;
        let mut bits: u8 = 0;
        for pair in self.timings[1..len - 1].chunks_exact(2) {
            let (high, low) = (pair[0], pair[1]);
            let bit = if near(high, 1) && near(low, 3) {
                0
            } else if near(high, 3) && near(low, 1) {
                1
            } else {
                debug!("Rx433: bad symbol {}/{} us at bit {}", high, low, bits);
                return None;
            };
            value = (value << 1) | bit;
            bits += 1;
        }
        Some(Rx433Frame {
            value,
            bits,
            pulse_us,
        })
    }
}

// ── Frame layouts ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    /// 24-bit frame: 20-bit transmitter address, 4-bit command.
    Addr20Cmd4,
}

impl FrameLayout {
    pub fn split(&self, frame: &Rx433Frame) -> Result<(u32, u32), SignalError> {
        match self {
            FrameLayout::Addr20Cmd4 => {
                if frame.bits != 24 {
                    return Err(SignalError::MalformedFrame);
                }
                Ok((frame.value >> 4, frame.value & 0xF))
            }
        }
    }
}

// ── Repeat filter ─────────────────────────────────────────────

/// Remotes repeat every press as a burst of identical frames; only the
/// first frame of a burst passes.
pub struct RepeatFilter {
    guard_ms: u32,
    last: Option<(u32, u32)>,
}

impl RepeatFilter {
    pub fn new(guard_ms: u32) -> Self {
        Self {
            guard_ms,
            last: None,
        }
    }

    /// `true` if the frame starts a new press.
    pub fn accept(&mut self, value: u32, now_ms: u32) -> bool {
        let repeat = self
            .last
            .is_some_and(|(v, at)| v == value && now_ms.wrapping_sub(at) < self.guard_ms);
        // A continuous burst keeps extending the guard.
        self.last = Some((value, now_ms));
        !repeat
    }
}

// ── Receiver ──────────────────────────────────────────────────

/// Decoder, repeat filter and layout glued together.
pub struct Rx433Receiver {
    decoder: PulseDecoder,
    repeats: RepeatFilter,
    layout: FrameLayout,
}

impl Rx433Receiver {
    pub fn new(layout: FrameLayout, repeat_guard_ms: u32) -> Self {
        Self {
            decoder: PulseDecoder::new(),
            repeats: RepeatFilter::new(repeat_guard_ms),
            layout,
        }
    }

    /// Feed one pulse; returns a signal for the first frame of each press.
    pub fn feed(&mut self, duration_us: u32, now_ms: u32) -> Option<InputSignal> {
        let frame = self.decoder.feed(duration_us)?;
        if !self.repeats.accept(frame.value, now_ms) {
            return None;
        }
        match SignalSource::Wireless433(self.layout).to_signal(&RawInput::Frame(frame), now_ms) {
            Ok(signal) => Some(signal),
            Err(e) => {
                debug!("Rx433: {} ({} bits, 0x{:X})", e, frame.bits, frame.value);
                None
            }
        }
    }

    /// Decode every pulse captured by the ISR since the last call.
    pub fn drain(&mut self, now_ms: u32, mut emit: impl FnMut(InputSignal)) {
        let dropped = PULSES_DROPPED.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            debug!("Rx433: {} pulse(s) lost on a full queue", dropped);
        }
        while let Some(duration) = PULSE_QUEUE.dequeue() {
            if let Some(signal) = self.feed(duration, now_ms) {
                emit(signal);
            }
        }
    }
}
