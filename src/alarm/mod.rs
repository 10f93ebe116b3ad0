//! Alarm engine domain: zones, sensors, events, gates, responses and modes.
//!
//! ```text
//!  Signal ──▶ matcher ──▶ ThresholdGate ──▶ ConfirmationGate ──▶ dispatcher
//!                                                                  │
//!                              ModeController ◀── CONTROL ─────────┘
//! ```
//!
//! Everything here is pure logic; hardware, network and storage are
//! reached through the port traits in [`crate::app::ports`].

pub mod dispatcher;
pub mod gates;
pub mod matcher;
pub mod mode;
pub mod registry;
pub mod state;

use serde::{Deserialize, Serialize};

/// Maximum zones in one registry.
pub const MAX_ZONES: usize = 16;
/// Maximum sensors in one registry.
pub const MAX_SENSORS: usize = 32;
/// Maximum event bindings across all sensors.
pub const MAX_EVENTS: usize = 64;
/// Maximum event slots owned by one sensor.
pub const MAX_SLOTS: usize = 8;

/// Display names and topic slugs.
pub type Label = heapless::String<48>;
/// Notification templates.
pub type Message = heapless::String<128>;

/// Copy `s` into a bounded string, truncating on a char boundary.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

// ── Mode ──────────────────────────────────────────────────────

/// Device-wide security posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    Disabled = 0,
    Armed = 1,
    /// Only the perimeter (doors, windows) is guarded; people are inside.
    Perimeter = 2,
    /// Only the outbuildings are guarded.
    Outbuildings = 3,
}

impl Mode {
    pub const COUNT: usize = 4;
    pub const ALL: [Mode; Mode::COUNT] = [
        Mode::Disabled,
        Mode::Armed,
        Mode::Perimeter,
        Mode::Outbuildings,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_u8(raw: u8) -> Option<Mode> {
        match raw {
            0 => Some(Mode::Disabled),
            1 => Some(Mode::Armed),
            2 => Some(Mode::Perimeter),
            3 => Some(Mode::Outbuildings),
            _ => None,
        }
    }

    /// Human-readable status line used in notifications and the status JSON.
    pub const fn status_text(self) -> &'static str {
        match self {
            Mode::Disabled => "Security disabled",
            Mode::Armed => "Security armed",
            Mode::Perimeter => "Perimeter armed",
            Mode::Outbuildings => "Outbuildings armed",
        }
    }
}

// ── Responses ─────────────────────────────────────────────────

/// What the dispatcher does when an event triggers or cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Log and publish only.
    Register,
    /// Siren, strobe and notification.
    AlarmSiren,
    /// Notification only.
    AlarmNotify,
    /// Tracked and published, notification suppressed.
    AlarmSilent,
    /// Mode change request from a remote control.
    Control,
}

impl ResponseKind {
    /// Responses that alert a person and therefore pass the confirmation gate.
    pub const fn escalates(self) -> bool {
        matches!(self, ResponseKind::AlarmSiren | ResponseKind::AlarmNotify)
    }

    /// Responses that count as an alarm in the status snapshot.
    pub const fn is_alarm(self) -> bool {
        matches!(
            self,
            ResponseKind::AlarmSiren | ResponseKind::AlarmNotify | ResponseKind::AlarmSilent
        )
    }
}

/// One (alarm, cancel) pair of a zone's per-mode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responses {
    pub alarm: ResponseKind,
    pub cancel: ResponseKind,
}

/// Trigger vs cancel side of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Trigger,
    Cancel,
}

// ── Events and sensors ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Alarm,
    Power,
    Tamper,
    CtrlOn,
    CtrlOff,
    CtrlPerimeter,
    CtrlOutbuildings,
}

impl EventKind {
    /// Mode requested by a control event, `None` for every other kind.
    pub const fn requested_mode(self) -> Option<Mode> {
        match self {
            EventKind::CtrlOn => Some(Mode::Armed),
            EventKind::CtrlOff => Some(Mode::Disabled),
            EventKind::CtrlPerimeter => Some(Mode::Perimeter),
            EventKind::CtrlOutbuildings => Some(Mode::Outbuildings),
            EventKind::Alarm | EventKind::Power | EventKind::Tamper => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Alarm => "alarm",
            EventKind::Power => "power",
            EventKind::Tamper => "tamper",
            EventKind::CtrlOn => "ctrl_on",
            EventKind::CtrlOff => "ctrl_off",
            EventKind::CtrlPerimeter => "ctrl_perimeter",
            EventKind::CtrlOutbuildings => "ctrl_outbuildings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// GPIO contact; address is the pin number.
    WiredDigital,
    /// 433 MHz transmitter; address is the 20-bit transmitter id.
    Wireless433,
    /// Sensor reported by another device over the network; address is its id.
    External,
}

/// Runtime phase of one event binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    Idle,
    /// Counting towards the threshold.
    Pending,
    /// Threshold reached, waiting for a second trigger in the zone.
    AwaitingConfirmation,
    Active,
}
