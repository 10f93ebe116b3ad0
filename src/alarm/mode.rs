//! Security mode ownership.
//!
//! The engine worker owns the live [`Mode`] inside a [`ModeController`].
//! Other tasks (status LED, network handlers) only read the last value the
//! worker published into a [`PublishedMode`] snapshot.

use core::sync::atomic::{AtomicU8, Ordering};

use log::info;

use super::Mode;

/// Lock-free copy of the last mode the worker committed.
pub struct PublishedMode(AtomicU8);

impl PublishedMode {
    pub const fn new() -> Self {
        Self(AtomicU8::new(Mode::Disabled as u8))
    }

    pub fn get(&self) -> Mode {
        Mode::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(Mode::Disabled)
    }

    fn set(&self, mode: Mode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

impl Default for PublishedMode {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide snapshot used by the firmware image.
pub static PUBLISHED_MODE: PublishedMode = PublishedMode::new();

/// Last mode committed by the engine worker.
pub fn published_mode() -> Mode {
    PUBLISHED_MODE.get()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
}

impl ModeChange {
    /// Leaving DISABLED for any guarded mode.
    pub fn arms(&self) -> bool {
        self.from == Mode::Disabled && self.to != Mode::Disabled
    }
}

pub struct ModeController {
    current: Mode,
    snapshot: &'static PublishedMode,
}

impl ModeController {
    pub fn new(initial: Mode) -> Self {
        Self::with_snapshot(initial, &PUBLISHED_MODE)
    }

    pub fn with_snapshot(initial: Mode, snapshot: &'static PublishedMode) -> Self {
        snapshot.set(initial);
        Self {
            current: initial,
            snapshot,
        }
    }

    pub fn current(&self) -> Mode {
        self.current
    }

    /// Apply a CONTROL outcome.  Requesting the current mode is a no-op.
    pub(crate) fn transition(&mut self, to: Mode) -> Option<ModeChange> {
        if to == self.current {
            return None;
        }
        let change = ModeChange {
            from: self.current,
            to,
        };
        self.current = to;
        self.snapshot.set(to);
        info!("Mode: {:?} -> {:?}", change.from, change.to);
        Some(change)
    }

    /// Reinstate a mode read back from storage.  Not a change: nothing is
    /// notified or published.
    pub(crate) fn restore(&mut self, mode: Mode) {
        self.current = mode;
        self.snapshot.set(mode);
    }
}
