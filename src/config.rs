//! System configuration parameters
//!
//! All tunable parameters for the alarm engine and its input sources.
//! Values can be overridden via NVS; the zone layout lives separately in
//! [`crate::layout`].

use heapless::String;
use serde::{Deserialize, Serialize};

/// Core alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    // --- Inputs ---
    /// Wired input debounce window (milliseconds)
    pub wired_debounce_ms: u32,
    /// Logic level that signals an alarm on wired inputs (true = HIGH)
    pub wired_alarm_level_high: bool,
    /// Identical 433 MHz frames within this interval are one press (milliseconds)
    pub rx433_repeat_guard_ms: u32,

    // --- Gates ---
    /// Threshold counting window for events without an auto-reset (milliseconds)
    pub threshold_window_ms: u32,
    /// Grace window for confirmation-required events (milliseconds)
    pub confirmation_window_ms: u32,

    // --- Annunciator ---
    /// Siren switches itself off after this long (milliseconds)
    pub siren_duration_ms: u32,

    // --- Policy ---
    /// Remote "off" while the siren sounds also disarms (otherwise silences only)
    pub remote_disarm_silences: bool,
    /// Notify on every mode change
    pub notify_mode_change: bool,
    /// Notify on alarm responses
    pub notify_alarm: bool,
    /// Notify when a signal comes from an unregistered sensor
    pub notify_undefined_sensor: bool,
    /// Notify when a registered sensor sends an unknown code
    pub notify_undefined_command: bool,

    // --- Publishing ---
    /// Topic prefix for every published state
    pub location: String<24>,
    /// QoS used for event and status publishes
    pub publish_qos: u8,

    // --- Timing ---
    /// Worker loop interval (milliseconds)
    pub tick_interval_ms: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        let mut location = String::new();
        let _ = location.push_str("home");
        Self {
            // Inputs
            wired_debounce_ms: 50,
            wired_alarm_level_high: true,
            rx433_repeat_guard_ms: 500,

            // Gates
            threshold_window_ms: 3_000,
            confirmation_window_ms: 60_000,

            // Annunciator
            siren_duration_ms: 180_000, // 3 min

            // Policy
            remote_disarm_silences: true,
            notify_mode_change: true,
            notify_alarm: true,
            notify_undefined_sensor: false,
            notify_undefined_command: false,

            // Publishing
            location,
            publish_qos: 1,

            // Timing
            tick_interval_ms: 10,
        }
    }
}
