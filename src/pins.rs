//! GPIO / peripheral pin assignments for the alarm main board (ESP32).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Annunciators
// ---------------------------------------------------------------------------

/// Digital output: external siren (active HIGH).
pub const SIREN_GPIO: i32 = 25;
/// Digital output: strobe / flasher (active HIGH).
pub const FLASHER_GPIO: i32 = 26;
/// Digital output: on-board active buzzer, follows the siren.
pub const BUZZER_GPIO: i32 = 13;
/// Digital output: "armed" indicator LED.
pub const ALARM_LED_GPIO: i32 = 23;

// ---------------------------------------------------------------------------
// Wired zone inputs
// ---------------------------------------------------------------------------

/// Front door reed contact.
pub const ZONE_DOOR_GPIO: i32 = 18;
/// Hallway PIR.
pub const ZONE_HALLWAY_GPIO: i32 = 19;
/// Gas leak detector.
pub const ZONE_GAS_GPIO: i32 = 12;
/// Mains power monitor.
pub const ZONE_MAIN_POWER_GPIO: i32 = 14;
/// Backup battery charge monitor.
pub const ZONE_BATTERY_GPIO: i32 = 2;

/// All wired inputs, in the order their ISRs are installed.
pub const WIRED_ZONE_GPIOS: [i32; 5] = [
    ZONE_DOOR_GPIO,
    ZONE_HALLWAY_GPIO,
    ZONE_GAS_GPIO,
    ZONE_MAIN_POWER_GPIO,
    ZONE_BATTERY_GPIO,
];

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

/// 433 MHz superheterodyne receiver data output, edge-interrupt driven.
pub const RX433_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// Relays
// ---------------------------------------------------------------------------

/// Relay channel 0 (boiler / external load).
pub const RELAY_0_GPIO: i32 = 27;

/// Relay channels indexed by zone relay number.
pub const RELAY_GPIOS: [i32; 1] = [RELAY_0_GPIO];
