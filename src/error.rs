//! Unified error types for the alarm engine.
//!
//! Four categories, each a `Copy` enum that converts into the top-level
//! [`Error`]:
//!
//! | Category           | Raised by                     | Handling                      |
//! |--------------------|-------------------------------|-------------------------------|
//! | [`ConfigError`]    | registry builder, layout      | caller decides, handle absent |
//! | [`SignalError`]    | sources, matcher              | logged, optionally notified   |
//! | [`OperationalError`]| timer signals                | discarded as a no-op          |
//! | [`ResourceError`]  | input queue                   | signal dropped, no retry      |
//!
//! None of them is fatal to the engine worker.

use core::fmt;

use crate::alarm::SensorKind;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Config(ConfigError),
    Signal(SignalError),
    Operational(OperationalError),
    Resource(ResourceError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Signal(e) => write!(f, "signal: {e}"),
            Self::Operational(e) => write!(f, "operational: {e}"),
            Self::Resource(e) => write!(f, "resource: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Rejected registration during startup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A zone with the same topic slug already exists.
    DuplicateZone,
    /// A sensor of the same kind already uses this address.
    DuplicateSensor,
    /// The sensor already owns an event in this slot.
    DuplicateSlot(u8),
    /// Another slot of the same sensor already triggers on this code.
    DuplicateTriggerCode(u32),
    /// The zone has no response pair for at least one mode.
    IncompleteResponses,
    /// Hardware address out of range for the sensor kind.
    InvalidAddress(u32),
    /// Threshold must be at least 1.
    InvalidThreshold,
    UnknownZone,
    UnknownSensor,
    /// A fixed-capacity table is full.
    CapacityExceeded(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateZone => write!(f, "duplicate zone"),
            Self::DuplicateSensor => write!(f, "duplicate sensor address"),
            Self::DuplicateSlot(slot) => write!(f, "duplicate event slot {slot}"),
            Self::DuplicateTriggerCode(code) => {
                write!(f, "duplicate trigger code 0x{code:08X}")
            }
            Self::IncompleteResponses => write!(f, "incomplete zone response table"),
            Self::InvalidAddress(addr) => write!(f, "invalid address 0x{addr:08X}"),
            Self::InvalidThreshold => write!(f, "threshold must be >= 1"),
            Self::UnknownZone => write!(f, "unknown zone handle"),
            Self::UnknownSensor => write!(f, "unknown sensor handle"),
            Self::CapacityExceeded(table) => write!(f, "{table} table full"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Signal errors
// ---------------------------------------------------------------------------

/// An input that could not be turned into an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// Wireless frame failed format validation.
    MalformedFrame,
    /// No sensor registered for this kind and address.
    UnknownSensor { kind: SensorKind, address: u32 },
    /// The sensor is known but none of its slots matches the code.
    UnknownCommand { kind: SensorKind, address: u32, code: u32 },
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame => write!(f, "malformed frame"),
            Self::UnknownSensor { kind, address } => {
                write!(f, "undefined sensor {kind:?} 0x{address:08X}")
            }
            Self::UnknownCommand {
                kind,
                address,
                code,
            } => write!(
                f,
                "undefined command 0x{code:08X} from {kind:?} 0x{address:08X}"
            ),
        }
    }
}

impl From<SignalError> for Error {
    fn from(e: SignalError) -> Self {
        Self::Signal(e)
    }
}

// ---------------------------------------------------------------------------
// Operational errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalError {
    /// A timer signal arrived after its event already moved on.
    StaleTimer,
}

impl fmt::Display for OperationalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleTimer => write!(f, "stale timer"),
        }
    }
}

impl From<OperationalError> for Error {
    fn from(e: OperationalError) -> Self {
        Self::Operational(e)
    }
}

// ---------------------------------------------------------------------------
// Resource errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Input queue full; the signal was dropped.
    QueueFull,
    /// The worker is stopping and no longer accepts signals.
    QueueClosed,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "input queue full"),
            Self::QueueClosed => write!(f, "input queue closed"),
        }
    }
}

impl From<ResourceError> for Error {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
