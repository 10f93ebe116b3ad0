//! HomeAlarm firmware library.
//!
//! Exposes the alarm engine, its input sources and the adapters for
//! integration testing and external inspection.  All ESP-IDF-specific code
//! is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod alarm;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod pins;
pub mod sources;
pub mod timers;

// Hardware-facing modules; simulation stubs on the host.
pub mod adapters;
pub mod drivers;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
