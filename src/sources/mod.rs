//! Signal sources: turn raw hardware observations into normalized
//! `(address, code)` pairs for the input queue.
//!
//! | Source         | Raw input                  | Address          | Code            |
//! |----------------|----------------------------|------------------|-----------------|
//! | `WiredDigital` | debounced pin level        | GPIO number      | 1 = alarm level |
//! | `Wireless433`  | decoded RF frame           | transmitter id   | button / status |
//! | `External`     | value reported over network| assigned id      | reported value  |
//!
//! Sources have no side effects beyond posting into the queue.

pub mod rx433;
pub mod wired;

use crate::alarm::SensorKind;
use crate::error::SignalError;
use crate::events::InputSignal;

use self::rx433::{FrameLayout, Rx433Frame};

/// One raw observation, before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// Debounced level change on a wired input.
    Level { pin: u32, alarm: bool },
    Frame(Rx433Frame),
    /// Value reported by another device for one of its sensors.
    External { id: u32, value: u32 },
}

/// Closed set of source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    WiredDigital,
    Wireless433(FrameLayout),
    External,
}

impl SignalSource {
    pub fn kind(&self) -> SensorKind {
        match self {
            SignalSource::WiredDigital => SensorKind::WiredDigital,
            SignalSource::Wireless433(_) => SensorKind::Wireless433,
            SignalSource::External => SensorKind::External,
        }
    }

    /// Split a raw observation into `(address, code)`.
    pub fn decode(&self, raw: &RawInput) -> Result<(u32, u32), SignalError> {
        match (self, raw) {
            (SignalSource::WiredDigital, RawInput::Level { pin, alarm }) => {
                Ok((*pin, u32::from(*alarm)))
            }
            (SignalSource::Wireless433(layout), RawInput::Frame(frame)) => layout.split(frame),
            (SignalSource::External, RawInput::External { id, value }) => Ok((*id, *value)),
            _ => Err(SignalError::MalformedFrame),
        }
    }

    /// Decode and stamp a queue-ready signal.
    pub fn to_signal(&self, raw: &RawInput, at_ms: u32) -> Result<InputSignal, SignalError> {
        let (address, code) = self.decode(raw)?;
        Ok(InputSignal {
            kind: self.kind(),
            address,
            code,
            at_ms,
        })
    }
}
