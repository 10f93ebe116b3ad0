//! Debounced wired zone inputs.
//!
//! ## Hardware
//!
//! Dry contacts and PIR relay outputs on plain GPIOs.  The GPIO ISR only
//! flags the pin in an atomic edge mask; `poll()` (called from the main
//! loop at tick rate) samples the level through `embedded_hal` and runs the
//! debounce state machine.  Without the ISR service every input is read
//! on every tick instead.
//!
//! A level must hold for the whole debounce window before it becomes the
//! new stable state.  The very first sample seeds the stable level without
//! emitting anything, so a door that is already open at boot does not raise
//! an alarm.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::digital::InputPin;
use log::warn;

use super::{RawInput, SignalSource};
use crate::events::InputSignal;

/// Pins that saw an edge since the last `take_edges()`, one bit per GPIO
/// split over two words.  Written by the ISR, read by the main loop.
static WIRED_EDGES: [AtomicU32; 2] = [AtomicU32::new(0), AtomicU32::new(0)];

/// ISR handler: register on both edges of every wired input.
/// Safe to call from interrupt context (lock-free atomic or).
pub fn note_edge_from_isr(pin: u32) {
    if pin < 64 {
        WIRED_EDGES[(pin / 32) as usize].fetch_or(1 << (pin % 32), Ordering::AcqRel);
    }
}

/// Drain the edge mask.
pub fn take_edges() -> u64 {
    let low = WIRED_EDGES[0].swap(0, Ordering::AcqRel);
    let high = WIRED_EDGES[1].swap(0, Ordering::AcqRel);
    (u64::from(high) << 32) | u64::from(low)
}

/// Sample the wired inputs due this tick and hand every transition to
/// `emit`.  With `isr_installed` only inputs that saw an edge or are still
/// settling are read; without it every input is read on every call.
pub fn poll_inputs<P: InputPin>(
    inputs: &mut [WiredInput<P>],
    isr_installed: bool,
    now_ms: u32,
    mut emit: impl FnMut(InputSignal),
) {
    let edges = isr_installed.then(take_edges);
    for input in inputs.iter_mut() {
        if !input.is_due(edges) {
            continue;
        }
        if let Some(signal) = input.poll(now_ms) {
            emit(signal);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    high: bool,
    since_ms: u32,
}

pub struct WiredInput<P: InputPin> {
    pin: P,
    address: u32,
    alarm_level_high: bool,
    debounce_ms: u32,
    stable: Option<bool>,
    candidate: Option<Candidate>,
}

impl<P: InputPin> WiredInput<P> {
    pub fn new(pin: P, address: u32, alarm_level_high: bool, debounce_ms: u32) -> Self {
        Self {
            pin,
            address,
            alarm_level_high,
            debounce_ms,
            stable: None,
            candidate: None,
        }
    }

    /// GPIO number this input reports as its address.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Last debounced level, `None` before the first sample.
    pub fn stable_high(&self) -> Option<bool> {
        self.stable
    }

    /// A level change is waiting out the debounce window, so the pin must
    /// keep being polled even without new edges.
    pub fn is_settling(&self) -> bool {
        self.candidate.is_some() || self.stable.is_none()
    }

    /// Bit of this input in the ISR edge mask.
    pub fn edge_bit(&self) -> u64 {
        if self.address < 64 { 1 << self.address } else { 0 }
    }

    /// Whether this input must be read now.  `edges` is the drained ISR
    /// mask, or `None` when no ISR reports edges.
    pub fn is_due(&self, edges: Option<u64>) -> bool {
        match edges {
            Some(mask) => mask & self.edge_bit() != 0 || self.is_settling(),
            None => true,
        }
    }

    /// Read the pin and feed the debouncer.
    pub fn poll(&mut self, now_ms: u32) -> Option<InputSignal> {
        match self.pin.is_high() {
            Ok(high) => self.sample(high, now_ms),
            Err(e) => {
                warn!("WiredInput: GPIO {} read failed: {:?}", self.address, e);
                None
            }
        }
    }

    /// Feed one raw level sample.  Returns a signal on a stable transition.
    pub fn sample(&mut self, high: bool, now_ms: u32) -> Option<InputSignal> {
        let Some(stable) = self.stable else {
            self.stable = Some(high);
            return None;
        };

        if high == stable {
            self.candidate = None;
            return None;
        }

        match self.candidate {
            Some(c) if c.high == high => {
                if now_ms.wrapping_sub(c.since_ms) < self.debounce_ms {
                    return None;
                }
            }
            _ => {
                self.candidate = Some(Candidate {
                    high,
                    since_ms: now_ms,
                });
                return None;
            }
        }

        self.stable = Some(high);
        self.candidate = None;
        let raw = RawInput::Level {
            pin: self.address,
            alarm: high == self.alarm_level_high,
        };
        SignalSource::WiredDigital.to_signal(&raw, now_ms).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Pin whose level the test sets directly.
    struct FakePin(bool);

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    #[test]
    fn first_sample_seeds_silently() {
        let mut input = WiredInput::new(FakePin(true), 18, true, 50);
        assert_eq!(input.poll(0), None);
        assert_eq!(input.stable_high(), Some(true));
    }

    #[test]
    fn transition_emitted_after_debounce() {
        let mut input = WiredInput::new(FakePin(false), 18, true, 50);
        input.poll(0);
        input.pin.0 = true;
        assert_eq!(input.poll(10), None);
        assert_eq!(input.poll(40), None);
        let sig = input.poll(60).unwrap();
        assert_eq!(sig.address, 18);
        assert_eq!(sig.code, 1);
        assert_eq!(sig.at_ms, 60);
        // Steady level: nothing more.
        assert_eq!(input.poll(500), None);
    }

    #[test]
    fn bounce_shorter_than_window_is_ignored() {
        let mut input = WiredInput::new(FakePin(false), 19, true, 50);
        input.sample(false, 0);
        assert_eq!(input.sample(true, 10), None);
        assert_eq!(input.sample(false, 20), None);
        assert_eq!(input.sample(true, 30), None);
        // The window restarts at the last edge.
        assert_eq!(input.sample(true, 70), None);
        assert!(input.sample(true, 80).is_some());
    }

    #[test]
    fn settling_until_level_is_stable() {
        let mut input = WiredInput::new(FakePin(false), 19, true, 50);
        assert!(input.is_settling(), "unseeded input must be polled");
        input.sample(false, 0);
        assert!(!input.is_settling());
        input.sample(true, 10);
        assert!(input.is_settling());
        input.sample(true, 60);
        assert!(!input.is_settling());
        assert_eq!(input.edge_bit(), 1 << 19);
    }

    #[test]
    fn active_low_inputs_invert_code() {
        let mut input = WiredInput::new(FakePin(true), 2, false, 50);
        input.sample(true, 0);
        input.sample(false, 10);
        let sig = input.sample(false, 100).unwrap();
        assert_eq!(sig.code, 1);
        input.sample(true, 200);
        let sig = input.sample(true, 300).unwrap();
        assert_eq!(sig.code, 0);
    }

    #[test]
    fn edge_mask_collects_pins() {
        take_edges();
        note_edge_from_isr(18);
        note_edge_from_isr(2);
        note_edge_from_isr(40);
        note_edge_from_isr(99);
        assert_eq!(take_edges(), (1 << 40) | (1 << 18) | (1 << 2));
        assert_eq!(take_edges(), 0);
    }

    #[test]
    fn without_isr_every_input_is_polled() {
        let mut inputs = [
            WiredInput::new(FakePin(false), 18, true, 50),
            WiredInput::new(FakePin(false), 19, true, 50),
        ];
        let mut out = std::vec::Vec::new();
        poll_inputs(&mut inputs, false, 0, |s| out.push(s));
        assert!(out.is_empty(), "first pass only seeds");

        inputs[1].pin.0 = true;
        poll_inputs(&mut inputs, false, 10, |s| out.push(s));
        poll_inputs(&mut inputs, false, 70, |s| out.push(s));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, 19);
        assert_eq!(out[0].code, 1);
    }

    #[test]
    fn with_isr_only_flagged_or_settling_inputs_are_due() {
        let mut input = WiredInput::new(FakePin(false), 19, true, 50);
        assert!(input.is_due(Some(0)), "unseeded input is always read");
        input.sample(false, 0);
        assert!(!input.is_due(Some(0)));
        assert!(!input.is_due(Some(1 << 18)));
        assert!(input.is_due(Some(1 << 19)));
        assert!(input.is_due(None));
    }
}
