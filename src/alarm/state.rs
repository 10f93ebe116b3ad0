//! Per-event runtime state and the restart snapshot.
//!
//! Only the engine worker touches [`EventTable`].  [`PersistedState`] is the
//! part that survives a reboot: the mode, the alarm counter and which events
//! were active.  Siren state is deliberately not restored.

use heapless::Vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::gates::ThresholdGate;
use super::registry::EventId;
use super::{EventPhase, MAX_EVENTS, Mode};
use crate::app::ports::{StorageError, StoragePort};

pub const STATE_NAMESPACE: &str = "alarm";
pub const STATE_KEY: &str = "state";
const STATE_VERSION: u8 = 1;
const MAX_STATE_BLOB: usize = 128;

// ── Runtime state ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct EventState {
    phase: EventPhase,
    pub gate: ThresholdGate,
    pub last_signal_ms: Option<u32>,
    pub active_since_ms: Option<u32>,
    /// Bumped on every phase change; timers carry the value they were armed with.
    token: u16,
}

impl EventState {
    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn token(&self) -> u16 {
        self.token
    }

    /// Move to `phase` and return the new token.
    pub fn enter(&mut self, phase: EventPhase) -> u16 {
        self.phase = phase;
        self.token = self.token.wrapping_add(1);
        if phase != EventPhase::Pending {
            self.gate.reset();
        }
        if phase != EventPhase::Active {
            self.active_since_ms = None;
        }
        self.token
    }
}

pub struct EventTable {
    states: Vec<EventState, MAX_EVENTS>,
}

impl EventTable {
    pub fn new(count: usize) -> Self {
        let mut states = Vec::new();
        for _ in 0..count.min(MAX_EVENTS) {
            let _ = states.push(EventState::default());
        }
        Self { states }
    }

    pub fn get(&self, id: EventId) -> &EventState {
        &self.states[id.index()]
    }

    pub fn get_mut(&mut self, id: EventId) -> &mut EventState {
        &mut self.states[id.index()]
    }

    /// Raw indices of every active event.
    pub fn active(&self) -> impl Iterator<Item = u8> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.phase == EventPhase::Active)
            .map(|(i, _)| i as u8)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Raw indices of every event that is not idle.
    pub fn busy(&self) -> impl Iterator<Item = u8> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.phase != EventPhase::Idle)
            .map(|(i, _)| i as u8)
    }
}

// ── Restart snapshot ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u8,
    pub mode: Mode,
    /// Alarms raised since the system was last armed.
    pub alarms: u32,
    /// Raw event indices that were active.
    pub active: Vec<u8, MAX_EVENTS>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            mode: Mode::Disabled,
            alarms: 0,
            active: Vec::new(),
        }
    }
}

impl PersistedState {
    pub fn new(mode: Mode, alarms: u32, active: impl Iterator<Item = u8>) -> Self {
        let mut set = Vec::new();
        for raw in active {
            if set.push(raw).is_err() {
                break;
            }
        }
        Self {
            version: STATE_VERSION,
            mode,
            alarms,
            active: set,
        }
    }

    /// Decode a stored blob; `None` for corrupt or foreign-version data.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match postcard::from_bytes::<PersistedState>(bytes) {
            Ok(state) if state.version == STATE_VERSION => Some(state),
            Ok(state) => {
                warn!("PersistedState: unsupported version {}", state.version);
                None
            }
            Err(_) => {
                warn!("PersistedState: corrupt blob ({} bytes)", bytes.len());
                None
            }
        }
    }

    pub fn load(storage: &impl StoragePort) -> Option<Self> {
        let mut buf = [0u8; MAX_STATE_BLOB];
        match storage.read(STATE_NAMESPACE, STATE_KEY, &mut buf) {
            Ok(len) => Self::decode(&buf[..len]),
            Err(StorageError::NotFound) => {
                info!("PersistedState: nothing stored, first boot");
                None
            }
            Err(e) => {
                warn!("PersistedState: read failed ({})", e);
                None
            }
        }
    }

    pub fn save(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(self).map_err(|_| StorageError::IoError)?;
        storage.write(STATE_NAMESPACE, STATE_KEY, &bytes)
    }
}
