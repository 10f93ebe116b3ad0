//! Annunciator drivers, hardware initialisation, and peripheral helpers.

pub mod annunciator;
pub mod hw_init;
pub mod watchdog;
