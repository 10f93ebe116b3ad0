//! Port traits: the hexagonal boundary between the alarm engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AlarmService (domain)
//! ```
//!
//! Driven adapters (outputs, notifications, publishing, storage) implement
//! these traits.  The [`AlarmService`](super::service::AlarmService)
//! consumes them via generics, so the engine never touches hardware or the
//! network directly.
//!
//! Every call from the engine into a port is fire-and-forget: the engine
//! never waits on network or flash, and port failures never stop the
//! worker.

use crate::alarm::EventKind;
use crate::config::AlarmConfig;
use crate::timers::TimerTag;

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → annunciators)
// ───────────────────────────────────────────────────────────────

/// Write-side port for sirens, strobes and relays.
pub trait OutputPort {
    fn set_siren(&mut self, on: bool);

    fn set_strobe(&mut self, on: bool);

    /// Switch a zone's relay output.
    fn set_relay(&mut self, relay: u8, on: bool);

    /// Armed indicator LED.
    fn set_armed_led(&mut self, on: bool);

    /// Kill every output for a safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Notification port (driven adapter: domain → messenger)
// ───────────────────────────────────────────────────────────────

/// Human-facing notifications (e.g. a chat bot).
pub trait NotifyPort {
    fn notify(&mut self, message: &str, zone: &str, kind: EventKind);
}

// ───────────────────────────────────────────────────────────────
// Publish port (driven adapter: domain → telemetry broker)
// ───────────────────────────────────────────────────────────────

/// Machine-facing state publication.
pub trait PublishPort {
    fn publish(&mut self, topic: &str, payload: &str, qos: u8, retained: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`AlarmEvent`](super::events::AlarmEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AlarmEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`AlarmConfig`].
///
/// Implementations MUST validate before persisting and reject out-of-range
/// values with [`SettingsError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration; [`AlarmConfig::default()`] when nothing is stored.
    fn load(&self) -> Result<AlarmConfig, SettingsError>;

    fn save(&self, config: &AlarmConfig) -> Result<(), SettingsError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.  Writes MUST be atomic, with no partial
/// writes on power loss.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Combined port set
// ───────────────────────────────────────────────────────────────

/// Everything the engine worker drives.  One value implements all ports so
/// the worker needs a single mutable borrow per signal.
pub trait AlarmIo: OutputPort + NotifyPort + PublishPort + EventSink + StoragePort {}

impl<T> AlarmIo for T where T: OutputPort + NotifyPort + PublishPort + EventSink + StoragePort {}

// ───────────────────────────────────────────────────────────────
// Timer delegate (decouples timers from the input queue)
// ───────────────────────────────────────────────────────────────

/// Callback the [`TimerQueue`](crate::timers::TimerQueue) invokes for each
/// due timer.  The worker implements it by posting a timer signal into the
/// input queue; the timer facility knows nothing about queues.
pub trait TimerDelegate {
    /// Returns `false` if the signal could not be delivered; the timer then
    /// stays armed.
    fn on_timer_fired(&mut self, tag: TimerTag, now_ms: u32) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum SettingsError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    /// Storage partition is full.
    Full,
    IoError,
}

impl core::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
