//! Application core: the engine worker and its boundary.
//!
//! [`service::AlarmService`] orchestrates the domain in [`crate::alarm`]:
//! matching, gating, dispatching and mode control.  All interaction with
//! hardware, the network and flash happens through the **port traits** in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
