//! Declarative zone and sensor layout.
//!
//! A [`Layout`] is plain data (JSON via `serde_json`, or built in code) that
//! drives the [`RegistryBuilder`].  Entries the builder rejects are logged
//! and skipped so one bad sensor never takes the whole system down.
//!
//! [`default_layout`] is the house configuration compiled into the firmware.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::alarm::registry::{EventSpec, Registry, RegistryBuilder};
use crate::alarm::{EventKind, Mode, ResponseKind, Responses, SensorKind};
use crate::pins;

/// Per-mode response table of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneResponses {
    pub disabled: Responses,
    pub armed: Responses,
    pub perimeter: Responses,
    pub outbuildings: Responses,
}

impl ZoneResponses {
    /// Same pair in every mode.
    pub const fn always(alarm: ResponseKind, cancel: ResponseKind) -> Self {
        let r = Responses { alarm, cancel };
        Self {
            disabled: r,
            armed: r,
            perimeter: r,
            outbuildings: r,
        }
    }

    fn get(&self, mode: Mode) -> Responses {
        match mode {
            Mode::Disabled => self.disabled,
            Mode::Armed => self.armed,
            Mode::Perimeter => self.perimeter,
            Mode::Outbuildings => self.outbuildings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub relay: Option<u8>,
    pub responses: ZoneResponses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    /// Topic of the zone the event belongs to.
    pub zone: String,
    pub slot: u8,
    pub spec: EventSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub kind: SensorKind,
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub local_publish: bool,
    pub address: u32,
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub zones: Vec<ZoneEntry>,
    pub sensors: Vec<SensorEntry>,
}

impl Layout {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Run every entry through the builder.
    pub fn build(&self) -> Registry {
        let mut builder = RegistryBuilder::new();
        let mut skipped = 0usize;

        for zone in &self.zones {
            let id = match builder.register_zone(&zone.name, &zone.topic, zone.relay) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Layout: zone '{}' skipped: {}", zone.topic, e);
                    skipped += 1;
                    continue;
                }
            };
            for mode in Mode::ALL {
                let r = zone.responses.get(mode);
                if let Err(e) = builder.set_responses(id, mode, r.alarm, r.cancel) {
                    warn!("Layout: zone '{}' {:?}: {}", zone.topic, mode, e);
                }
            }
        }

        for sensor in &self.sensors {
            let id = match builder.register_sensor(
                sensor.kind,
                &sensor.name,
                &sensor.topic,
                sensor.local_publish,
                sensor.address,
            ) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Layout: sensor '{}' skipped: {}", sensor.topic, e);
                    skipped += 1;
                    continue;
                }
            };
            for event in &sensor.events {
                let Some(zone) = builder.zone_id(&event.zone) else {
                    warn!(
                        "Layout: '{}' slot {} names unknown zone '{}'",
                        sensor.topic, event.slot, event.zone
                    );
                    skipped += 1;
                    continue;
                };
                if let Err(e) = builder.bind_event(id, zone, event.slot, event.spec.clone()) {
                    warn!(
                        "Layout: '{}' slot {} skipped: {}",
                        sensor.topic, event.slot, e
                    );
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("Layout: {} entries skipped", skipped);
        }
        let registry = builder.finish();
        info!("Layout: registry ready");
        registry
    }
}

// ── Default house configuration ───────────────────────────────

/// External sensor ids reported by other devices on the network.
pub const EXT_TOILET_PIR_ID: u32 = 0xFF00_0001;
pub const EXT_KITCHEN_PIR_ID: u32 = 0xFF00_0002;

fn zone(name: &str, topic: &str, responses: ZoneResponses) -> ZoneEntry {
    ZoneEntry {
        name: name.into(),
        topic: topic.into(),
        relay: None,
        responses,
    }
}

fn pair(alarm: ResponseKind, cancel: ResponseKind) -> Responses {
    Responses { alarm, cancel }
}

fn sensor(
    kind: SensorKind,
    name: &str,
    topic: &str,
    local_publish: bool,
    address: u32,
    events: Vec<EventEntry>,
) -> SensorEntry {
    SensorEntry {
        kind,
        name: name.into(),
        topic: topic.into(),
        local_publish,
        address,
        events,
    }
}

fn event(zone: &str, slot: u8, spec: EventSpec) -> EventEntry {
    EventEntry {
        zone: zone.into(),
        slot,
        spec,
    }
}

pub fn default_layout() -> Layout {
    use ResponseKind::{AlarmNotify, AlarmSilent, AlarmSiren, Control, Register};

    let zones = vec![
        zone(
            "Doors",
            "doors",
            ZoneResponses {
                disabled: pair(Register, Register),
                armed: pair(AlarmSiren, Register),
                perimeter: pair(AlarmSiren, Register),
                outbuildings: pair(AlarmNotify, Register),
            },
        ),
        zone(
            "Windows",
            "windows",
            ZoneResponses {
                disabled: pair(Register, Register),
                armed: pair(AlarmSiren, Register),
                perimeter: pair(AlarmNotify, Register),
                outbuildings: pair(AlarmNotify, Register),
            },
        ),
        zone(
            "Indoor",
            "indoor",
            ZoneResponses {
                disabled: pair(Register, Register),
                armed: pair(AlarmSiren, Register),
                perimeter: pair(Register, Register),
                outbuildings: pair(Register, Register),
            },
        ),
        zone(
            "Outdoor",
            "outdoor",
            ZoneResponses {
                disabled: pair(Register, Register),
                armed: pair(AlarmNotify, Register),
                perimeter: pair(AlarmNotify, Register),
                outbuildings: pair(AlarmNotify, Register),
            },
        ),
        zone(
            "Fire",
            "fire",
            ZoneResponses {
                disabled: pair(AlarmSilent, AlarmNotify),
                armed: pair(AlarmSiren, AlarmNotify),
                perimeter: pair(AlarmSiren, AlarmNotify),
                outbuildings: pair(AlarmSiren, AlarmNotify),
            },
        ),
        zone("Tamper", "tamper", ZoneResponses::always(AlarmSiren, AlarmNotify)),
        zone("Power supply", "power", ZoneResponses::always(Register, Register)),
        zone("Utilities", "tech", ZoneResponses::always(AlarmSilent, AlarmNotify)),
        zone("Panic buttons", "buttons", ZoneResponses::always(AlarmSiren, AlarmNotify)),
        zone("Remote controls", "controls", ZoneResponses::always(Control, Control)),
    ];

    let wired = |pin: i32| pin as u32;
    let sensors = vec![
        // ── Wired inputs ──
        sensor(
            SensorKind::WiredDigital,
            "Front door",
            "door",
            true,
            wired(pins::ZONE_DOOR_GPIO),
            vec![event(
                "doors",
                0,
                EventSpec::new(EventKind::Alarm, 1)
                    .message("Front door opened")
                    .cancel(0, None)
                    .republish_secs(60),
            )],
        ),
        sensor(
            SensorKind::WiredDigital,
            "Hallway",
            "hallway",
            true,
            wired(pins::ZONE_HALLWAY_GPIO),
            vec![event(
                "indoor",
                0,
                EventSpec::new(EventKind::Alarm, 1)
                    .message("Motion detected")
                    .cancel(0, None)
                    .republish_secs(60)
                    .confirmed(),
            )],
        ),
        sensor(
            SensorKind::WiredDigital,
            "Gas",
            "gas",
            true,
            wired(pins::ZONE_GAS_GPIO),
            vec![event(
                "tech",
                0,
                EventSpec::new(EventKind::Alarm, 1)
                    .message("Gas leak detected")
                    .cancel(0, Some("Fault cleared"))
                    .republish_secs(60),
            )],
        ),
        sensor(
            SensorKind::WiredDigital,
            "Mains 220V",
            "main_power",
            true,
            wired(pins::ZONE_MAIN_POWER_GPIO),
            vec![event(
                "power",
                0,
                EventSpec::new(EventKind::Power, 1)
                    .message("Mains power lost")
                    .cancel(0, Some("Mains power restored")),
            )],
        ),
        sensor(
            SensorKind::WiredDigital,
            "Battery",
            "battery",
            false,
            wired(pins::ZONE_BATTERY_GPIO),
            vec![event(
                "power",
                0,
                EventSpec::new(EventKind::Power, 0)
                    .message("Battery low")
                    .cancel(1, Some("Battery charged")),
            )],
        ),
        // ── 433 MHz sensors ──
        sensor(
            SensorKind::Wireless433,
            "Smoke",
            "smoke",
            false,
            0x000D_7797,
            vec![event(
                "fire",
                0,
                EventSpec::new(EventKind::Alarm, 0x09)
                    .message("Smoke detected")
                    .auto_reset_ms(60_000),
            )],
        ),
        sensor(
            SensorKind::Wireless433,
            "Room 1",
            "room1/pir",
            true,
            0x0004_D1D0,
            vec![
                event(
                    "indoor",
                    0,
                    EventSpec::new(EventKind::Alarm, 0x09)
                        .message("Motion detected")
                        .auto_reset_ms(30_000)
                        .republish_secs(600)
                        .confirmed(),
                ),
                event(
                    "tamper",
                    1,
                    EventSpec::new(EventKind::Tamper, 0x0D)
                        .message("Sensor tamper attempt")
                        .auto_reset_ms(300_000),
                ),
            ],
        ),
        // ── 433 MHz remote ──
        sensor(
            SensorKind::Wireless433,
            "Remote",
            "rc",
            false,
            0x0004_F9CB,
            vec![
                event(
                    "controls",
                    0,
                    EventSpec::new(EventKind::CtrlOff, 0x01)
                        .threshold(2)
                        .auto_reset_ms(3_000),
                ),
                event(
                    "controls",
                    1,
                    EventSpec::new(EventKind::CtrlOn, 0x08)
                        .threshold(2)
                        .auto_reset_ms(3_000),
                ),
                event(
                    "controls",
                    2,
                    EventSpec::new(EventKind::CtrlPerimeter, 0x04)
                        .threshold(2)
                        .auto_reset_ms(3_000),
                ),
                event(
                    "buttons",
                    3,
                    EventSpec::new(EventKind::Alarm, 0x02)
                        .message("Panic button pressed")
                        .threshold(2)
                        .auto_reset_ms(3_000),
                ),
            ],
        ),
        // ── External sensors (other devices) ──
        sensor(
            SensorKind::External,
            "Bathroom",
            "toilet_pir",
            false,
            EXT_TOILET_PIR_ID,
            vec![event(
                "indoor",
                0,
                EventSpec::new(EventKind::Alarm, 1)
                    .message("Motion detected")
                    .cancel(0, None)
                    .confirmed(),
            )],
        ),
        sensor(
            SensorKind::External,
            "Kitchen",
            "kitchen_pir",
            false,
            EXT_KITCHEN_PIR_ID,
            vec![event(
                "indoor",
                0,
                EventSpec::new(EventKind::Alarm, 1)
                    .message("Motion detected")
                    .cancel(0, None)
                    .confirmed(),
            )],
        ),
    ];

    Layout { zones, sensors }
}
