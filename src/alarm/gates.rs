//! Gates that decide whether raw signals become a qualifying trigger.
//!
//! - [`ThresholdGate`] (per event): N signals inside a counting window.
//! - [`ConfirmationGate`] (per zone): a second confirmed trigger inside a
//!   grace window before a confirmation-required event may escalate.
//!
//! Both work on wrapping millisecond timestamps, like the input drivers.

use log::debug;

use super::MAX_ZONES;
use super::registry::{EventId, ZoneId};

// ── Threshold ─────────────────────────────────────────────────

/// Result of feeding one signal into a [`ThresholdGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// Still below threshold; carries the running count.
    Counting(u8),
    /// Threshold reached; the gate has reset itself.
    Reached,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdGate {
    count: u8,
    window_start_ms: u32,
}

impl ThresholdGate {
    pub fn register(&mut self, now_ms: u32, threshold: u8, window_ms: u32) -> Count {
        if self.count > 0 && now_ms.wrapping_sub(self.window_start_ms) > window_ms {
            debug!("ThresholdGate: window lapsed after {} signal(s)", self.count);
            self.count = 0;
        }
        if self.count == 0 {
            self.window_start_ms = now_ms;
        }
        self.count = self.count.saturating_add(1);
        if self.count >= threshold {
            self.count = 0;
            Count::Reached
        } else {
            Count::Counting(self.count)
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u8 {
        self.count
    }
}

// ── Confirmation ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PendingConfirmation {
    event: EventId,
    opened_ms: u32,
    token: u16,
}

/// Result of offering a confirmed trigger to the [`ConfirmationGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// First trigger: a grace window is now open.  `superseded` is an older
    /// pending event of the same zone that this one replaced.
    Opened {
        token: u16,
        superseded: Option<EventId>,
    },
    /// Second trigger inside the window; `opener` started it.
    Confirmed { opener: EventId },
}

/// One pending record per zone.  Only confirmation-required events open a
/// record, so any pending event of the same zone is an allowed sibling.
pub struct ConfirmationGate {
    pending: [Option<PendingConfirmation>; MAX_ZONES],
    next_token: u16,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self {
            pending: [None; MAX_ZONES],
            next_token: 1,
        }
    }

    pub fn offer(
        &mut self,
        zone: ZoneId,
        event: EventId,
        now_ms: u32,
        window_ms: u32,
    ) -> Confirmation {
        let slot = &mut self.pending[zone.index()];
        let mut superseded = None;
        if let Some(open) = slot.take() {
            if now_ms.wrapping_sub(open.opened_ms) <= window_ms {
                return Confirmation::Confirmed { opener: open.event };
            }
            if open.event != event {
                superseded = Some(open.event);
            }
        }

        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1).max(1);
        *slot = Some(PendingConfirmation {
            event,
            opened_ms: now_ms,
            token,
        });
        Confirmation::Opened { token, superseded }
    }

    /// Close the window opened by `event` with `token`.  Returns `false`
    /// when the window was already consumed or replaced.
    pub fn expire(&mut self, zone: ZoneId, event: EventId, token: u16) -> bool {
        let current = self.pending[zone.index()]
            .is_some_and(|open| open.event == event && open.token == token);
        if current {
            self.pending[zone.index()] = None;
        }
        current
    }

    pub fn pending(&self, zone: ZoneId) -> Option<EventId> {
        self.pending[zone.index()].map(|p| p.event)
    }

    pub fn clear_all(&mut self) {
        self.pending = [None; MAX_ZONES];
    }
}
