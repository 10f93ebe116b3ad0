//! Interrupt-safe input queue.
//!
//! Signals are produced by:
//! - the wired-input poller and GPIO ISRs
//! - the 433 MHz pulse decoder
//! - external sensor reports from the network task
//! - the engine's own timer facility (synthetic signals)
//! - administrative overrides
//!
//! and consumed by the single engine worker, strictly in arrival order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Wired poll  │────▶│              │     │              │
//! │ RX433 ISR   │────▶│ SignalQueue  │────▶│ AlarmService │
//! │ Timers      │────▶│ (bounded)    │     │ (consumer)   │
//! │ Admin       │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Posting never blocks.  A full queue drops the signal and bumps a counter
//! the worker reports later, because producers may run in interrupt context
//! where logging is not allowed.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::alarm::SensorKind;
use crate::app::commands::AdminCommand;
use crate::error::ResourceError;
use crate::timers::TimerTag;

/// Input queue depth.
pub const QUEUE_DEPTH: usize = 32;

/// Normalized (address, code) report from a signal source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSignal {
    pub kind: SensorKind,
    pub address: u32,
    pub code: u32,
    pub at_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Input(InputSignal),
    /// Posted by the timer facility.
    Timer { tag: TimerTag, at_ms: u32 },
    Admin { command: AdminCommand, at_ms: u32 },
}

impl Signal {
    pub fn at_ms(&self) -> u32 {
        match self {
            Signal::Input(input) => input.at_ms,
            Signal::Timer { at_ms, .. } | Signal::Admin { at_ms, .. } => *at_ms,
        }
    }
}

/// Bounded multi-producer queue feeding the engine worker.
pub struct SignalQueue {
    channel: Channel<CriticalSectionRawMutex, Signal, QUEUE_DEPTH>,
    closed: AtomicBool,
    dropped: AtomicU32,
}

impl Default for SignalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue without blocking.  Safe to call from ISR context.
    pub fn post(&self, signal: Signal) -> Result<(), ResourceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ResourceError::QueueClosed);
        }
        self.channel.try_send(signal).map_err(|_| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            ResourceError::QueueFull
        })
    }

    /// Next signal in arrival order.
    pub fn pop(&self) -> Option<Signal> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending signals into a callback, FIFO.
    pub fn drain(&self, mut handler: impl FnMut(Signal)) {
        while let Some(signal) = self.pop() {
            handler(signal);
        }
    }

    /// Stop accepting signals.  Already queued signals stay poppable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Signals dropped since the last call.
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

/// Queue shared by the firmware image's ISRs and the worker.
pub static INPUT_QUEUE: SignalQueue = SignalQueue::new();

#[cfg(test)]
mod tests {
    use super::*;

    fn input(code: u32) -> Signal {
        Signal::Input(InputSignal {
            kind: SensorKind::WiredDigital,
            address: 18,
            code,
            at_ms: code,
        })
    }

    #[test]
    fn fifo_order() {
        let q = SignalQueue::new();
        for code in 0..5 {
            q.post(input(code)).unwrap();
        }
        let mut seen = Vec::new();
        q.drain(|s| seen.push(s.at_ms()));
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let q = SignalQueue::new();
        for code in 0..QUEUE_DEPTH as u32 {
            q.post(input(code)).unwrap();
        }
        assert_eq!(q.post(input(99)), Err(ResourceError::QueueFull));
        assert_eq!(q.post(input(100)), Err(ResourceError::QueueFull));
        assert_eq!(q.take_dropped(), 2);
        assert_eq!(q.take_dropped(), 0);
        // The oldest signal is still at the head.
        assert_eq!(q.pop(), Some(input(0)));
    }

    #[test]
    fn closed_queue_rejects_but_drains() {
        let q = SignalQueue::new();
        q.post(input(1)).unwrap();
        q.close();
        assert_eq!(q.post(input(2)), Err(ResourceError::QueueClosed));
        assert_eq!(q.pop(), Some(input(1)));
        assert_eq!(q.pop(), None);
        assert_eq!(q.take_dropped(), 0);
    }
}
