//! Outbound engine events.
//!
//! The [`AlarmService`](super::service::AlarmService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters decide what to
//! do with them: log to serial, forward to a dashboard, etc.

use serde::Serialize;

use crate::alarm::registry::EventId;
use crate::alarm::{Direction, Label, Mode, ResponseKind};
use crate::error::SignalError;

/// Structured events emitted by the engine worker.
#[derive(Debug, Clone)]
pub enum AlarmEvent {
    /// The worker started (carries the restored mode).
    Started { mode: Mode, restored_active: usize },

    /// A signal counted towards an event's threshold.
    Counting { event: EventId, count: u8, threshold: u8 },

    /// A confirmation-required event opened its grace window.
    AwaitingConfirmation { event: EventId, zone: Label },

    /// The grace window lapsed without a second trigger.
    Unconfirmed { event: EventId, zone: Label },

    /// The dispatcher executed a response.
    Dispatched {
        event: EventId,
        sensor: Label,
        zone: Label,
        direction: Direction,
        response: ResponseKind,
        mode: Mode,
    },

    ModeChanged { from: Mode, to: Mode },

    SirenChanged { on: bool },

    /// A signal could not be attributed to an event.
    Undefined(SignalError),

    /// Administrative clear of every busy event.
    ForcedClear { cleared: usize },

    /// Producers dropped signals on a full queue since the last report.
    SignalsDropped(u32),

    /// The worker drained its queue and stopped.
    Stopped,
}

/// Last dispatched event, as shown in the status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastEvent {
    pub sensor: Label,
    pub zone: Label,
    pub time_ms: u32,
}

/// Point-in-time status, serialized as the retained status JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: &'static str,
    pub mode: Mode,
    /// Alarms raised since the system was last armed.
    pub alarms: u32,
    pub siren: bool,
    pub active_events: usize,
    pub event: Option<LastEvent>,
}
