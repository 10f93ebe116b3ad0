//! Shared timer facility.
//!
//! Holds every outstanding engine timer (auto-reset, count window,
//! confirmation window, republish cadence, siren timeout) in fixed slots.
//! Timers never touch event state: when one is due the queue hands its
//! [`TimerTag`] to a [`TimerDelegate`], which posts a synthetic signal into
//! the engine's input queue.
//!
//! ```text
//!   AlarmService ── arm/cancel ──▶ TimerQueue
//!                                     │ poll(now)
//!                                     ▼
//!                              TimerDelegate ──▶ SignalQueue ──▶ AlarmService
//! ```

use heapless::Vec;
use log::{debug, warn};

use crate::alarm::MAX_EVENTS;
use crate::alarm::registry::EventId;
use crate::app::ports::TimerDelegate;

/// One slot per (event, timer kind) plus the siren, so re-arming by key
/// can never run out of room.
const MAX_TIMERS: usize = MAX_EVENTS * EventTimer::ALL.len() + 1;

/// Per-event timer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTimer {
    /// Synthesizes a cancel for an active event.
    AutoReset,
    /// Returns a pending event to idle once its counting window lapses.
    CountWindow,
    /// Closes a confirmation grace window.
    ConfirmWindow,
    /// Re-publishes an active event's state.
    Republish,
}

impl EventTimer {
    pub const ALL: [EventTimer; 4] = [
        EventTimer::AutoReset,
        EventTimer::CountWindow,
        EventTimer::ConfirmWindow,
        EventTimer::Republish,
    ];
}

/// Identity of a fired timer.  `token` is the owner's generation when the
/// timer was armed, checked again when the signal is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTag {
    Event {
        kind: EventTimer,
        event: EventId,
        token: u16,
    },
    Siren {
        token: u16,
    },
}

impl TimerTag {
    /// Two tags with the same key occupy the same slot.
    fn same_slot(&self, other: &TimerTag) -> bool {
        match (self, other) {
            (
                TimerTag::Event { kind, event, .. },
                TimerTag::Event {
                    kind: k2,
                    event: e2,
                    ..
                },
            ) => kind == k2 && event == e2,
            (TimerTag::Siren { .. }, TimerTag::Siren { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    tag: TimerTag,
    armed_at_ms: u32,
    duration_ms: u32,
}

impl TimerEntry {
    fn elapsed(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.armed_at_ms)
    }

    fn is_due(&self, now_ms: u32) -> bool {
        self.elapsed(now_ms) >= self.duration_ms
    }
}

pub struct TimerQueue {
    entries: Vec<TimerEntry, MAX_TIMERS>,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Arm (or re-arm) a timer.  Returns `false` if every slot is taken.
    #[must_use]
    pub fn arm(&mut self, tag: TimerTag, now_ms: u32, duration_ms: u32) -> bool {
        let entry = TimerEntry {
            tag,
            armed_at_ms: now_ms,
            duration_ms,
        };
        if let Some(existing) = self.entries.iter_mut().find(|e| e.tag.same_slot(&tag)) {
            *existing = entry;
            return true;
        }
        if self.entries.push(entry).is_err() {
            warn!("TimerQueue: full, dropping {:?}", tag);
            return false;
        }
        true
    }

    pub fn cancel(&mut self, kind: EventTimer, event: EventId) {
        self.entries.retain(|e| {
            !matches!(e.tag, TimerTag::Event { kind: k, event: ev, .. } if k == kind && ev == event)
        });
    }

    /// Cancel every timer owned by `event`.
    pub fn cancel_event(&mut self, event: EventId) {
        self.entries
            .retain(|e| !matches!(e.tag, TimerTag::Event { event: ev, .. } if ev == event));
    }

    pub fn cancel_siren(&mut self) {
        self.entries
            .retain(|e| !matches!(e.tag, TimerTag::Siren { .. }));
    }

    /// Drop every timer.  Returns how many were outstanding.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn is_armed(&self, kind: EventTimer, event: EventId) -> bool {
        self.entries.iter().any(
            |e| matches!(e.tag, TimerTag::Event { kind: k, event: ev, .. } if k == kind && ev == event),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand every due timer to `delegate`, most overdue first.  A timer the
    /// delegate could not accept stays armed and is offered again next poll.
    pub fn poll(&mut self, now_ms: u32, delegate: &mut dyn TimerDelegate) -> usize {
        let mut due: Vec<(u32, TimerTag), MAX_TIMERS> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.is_due(now_ms)) {
            let overdue = entry.elapsed(now_ms) - entry.duration_ms;
            let _ = due.push((overdue, entry.tag));
        }
        due.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut fired = 0;
        for (_, tag) in due {
            if delegate.on_timer_fired(tag, now_ms) {
                self.entries.retain(|e| e.tag != tag);
                fired += 1;
            } else {
                debug!("TimerQueue: {:?} deferred", tag);
            }
        }
        fired
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
