//! Write-once tables of zones, sensors and event bindings.
//!
//! Configuration goes through [`RegistryBuilder`] on the main task before
//! the engine worker starts.  [`RegistryBuilder::finish`] freezes the tables
//! into a [`Registry`], which only hands out shared references afterwards.
//! Handles are plain indices into the arena.

use heapless::Vec;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{
    Direction, EventKind, Label, MAX_EVENTS, MAX_SENSORS, MAX_SLOTS, MAX_ZONES, Message, Mode,
    ResponseKind, Responses, SensorKind, bounded,
};
use crate::error::ConfigError;

/// Highest GPIO number on the ESP32.
const MAX_WIRED_PIN: u32 = 39;
/// Widest transmitter id a 32-bit frame can carry next to a 4-bit command.
const MAX_WIRELESS_ADDRESS: u32 = 0x0FFF_FFFF;

// ── Handles ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorId(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(u8);

impl ZoneId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl SensorId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl EventId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

// ── Entries ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Zone {
    pub name: Label,
    pub topic: Label,
    /// Output relay switched with the zone's alarm state.
    pub relay: Option<u8>,
    responses: [Option<Responses>; Mode::COUNT],
}

impl Zone {
    pub fn responses(&self, mode: Mode) -> Option<Responses> {
        self.responses[mode.index()]
    }

    /// Configured response for `mode` and `direction`.  `None` only for an
    /// incomplete zone, which no event can be bound to.
    pub fn response(&self, mode: Mode, direction: Direction) -> Option<ResponseKind> {
        self.responses(mode).map(|r| match direction {
            Direction::Trigger => r.alarm,
            Direction::Cancel => r.cancel,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.responses.iter().all(Option::is_some)
    }
}

#[derive(Debug, Clone)]
pub struct Sensor {
    pub kind: SensorKind,
    pub name: Label,
    pub topic: Label,
    /// Also publish the raw state on the local topic tree.
    pub local_publish: bool,
    pub address: u32,
    slots: Vec<EventId, MAX_SLOTS>,
}

impl Sensor {
    /// Event bindings in registration order.
    pub fn events(&self) -> &[EventId] {
        &self.slots
    }
}

/// Parameters of one event slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    pub kind: EventKind,
    pub trigger_code: u32,
    #[serde(default)]
    pub trigger_message: Option<Message>,
    /// `None` means the sensor never reports a cancel code.
    #[serde(default)]
    pub cancel_code: Option<u32>,
    #[serde(default)]
    pub cancel_message: Option<Message>,
    /// Qualifying signals needed inside the counting window.
    pub threshold: u8,
    /// 0 disables automatic cancellation.
    #[serde(default)]
    pub auto_reset_ms: u32,
    /// 0 disables periodic republishing while active.
    #[serde(default)]
    pub republish_secs: u32,
    #[serde(default)]
    pub confirm: bool,
}

impl EventSpec {
    pub fn new(kind: EventKind, trigger_code: u32) -> Self {
        Self {
            kind,
            trigger_code,
            trigger_message: None,
            cancel_code: None,
            cancel_message: None,
            threshold: 1,
            auto_reset_ms: 0,
            republish_secs: 0,
            confirm: false,
        }
    }

    #[must_use]
    pub fn message(mut self, text: &str) -> Self {
        self.trigger_message = Some(bounded(text));
        self
    }

    #[must_use]
    pub fn cancel(mut self, code: u32, text: Option<&str>) -> Self {
        self.cancel_code = Some(code);
        self.cancel_message = text.map(bounded);
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn auto_reset_ms(mut self, ms: u32) -> Self {
        self.auto_reset_ms = ms;
        self
    }

    #[must_use]
    pub fn republish_secs(mut self, secs: u32) -> Self {
        self.republish_secs = secs;
        self
    }

    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirm = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EventBinding {
    pub sensor: SensorId,
    pub zone: ZoneId,
    pub slot: u8,
    pub spec: EventSpec,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RegistryBuilder {
    zones: Vec<Zone, MAX_ZONES>,
    sensors: Vec<Sensor, MAX_SENSORS>,
    events: Vec<EventBinding, MAX_EVENTS>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_zone(
        &mut self,
        name: &str,
        topic: &str,
        relay: Option<u8>,
    ) -> Result<ZoneId, ConfigError> {
        if self.zones.iter().any(|z| z.topic.as_str() == topic) {
            warn!("Registry: zone '{}' already registered", topic);
            return Err(ConfigError::DuplicateZone);
        }
        let id = ZoneId(self.zones.len() as u8);
        self.zones
            .push(Zone {
                name: bounded(name),
                topic: bounded(topic),
                relay,
                responses: [None; Mode::COUNT],
            })
            .map_err(|_| ConfigError::CapacityExceeded("zone"))?;
        debug!("Registry: zone '{}' -> {:?}", topic, id);
        Ok(id)
    }

    pub fn set_responses(
        &mut self,
        zone: ZoneId,
        mode: Mode,
        alarm: ResponseKind,
        cancel: ResponseKind,
    ) -> Result<(), ConfigError> {
        let entry = self
            .zones
            .get_mut(zone.index())
            .ok_or(ConfigError::UnknownZone)?;
        entry.responses[mode.index()] = Some(Responses { alarm, cancel });
        Ok(())
    }

    /// Convenience for zones that respond identically in every mode.
    pub fn set_responses_all(
        &mut self,
        zone: ZoneId,
        alarm: ResponseKind,
        cancel: ResponseKind,
    ) -> Result<(), ConfigError> {
        for mode in Mode::ALL {
            self.set_responses(zone, mode, alarm, cancel)?;
        }
        Ok(())
    }

    pub fn register_sensor(
        &mut self,
        kind: SensorKind,
        name: &str,
        topic: &str,
        local_publish: bool,
        address: u32,
    ) -> Result<SensorId, ConfigError> {
        let valid = match kind {
            SensorKind::WiredDigital => address <= MAX_WIRED_PIN,
            SensorKind::Wireless433 => address != 0 && address <= MAX_WIRELESS_ADDRESS,
            SensorKind::External => address != 0,
        };
        if !valid {
            warn!("Registry: sensor '{}' has invalid address 0x{:08X}", topic, address);
            return Err(ConfigError::InvalidAddress(address));
        }
        if self
            .sensors
            .iter()
            .any(|s| s.kind == kind && s.address == address)
        {
            warn!("Registry: sensor '{}' duplicates address 0x{:08X}", topic, address);
            return Err(ConfigError::DuplicateSensor);
        }
        let id = SensorId(self.sensors.len() as u8);
        self.sensors
            .push(Sensor {
                kind,
                name: bounded(name),
                topic: bounded(topic),
                local_publish,
                address,
                slots: Vec::new(),
            })
            .map_err(|_| ConfigError::CapacityExceeded("sensor"))?;
        debug!("Registry: sensor '{}' {:?} 0x{:08X} -> {:?}", topic, kind, address, id);
        Ok(id)
    }

    pub fn bind_event(
        &mut self,
        sensor: SensorId,
        zone: ZoneId,
        slot: u8,
        spec: EventSpec,
    ) -> Result<EventId, ConfigError> {
        let target = self.zones.get(zone.index()).ok_or(ConfigError::UnknownZone)?;
        if !target.is_complete() {
            warn!("Registry: zone '{}' has no response for every mode", target.topic);
            return Err(ConfigError::IncompleteResponses);
        }
        if spec.threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        let owner = self
            .sensors
            .get(sensor.index())
            .ok_or(ConfigError::UnknownSensor)?;
        for existing in owner.slots.iter().map(|e| &self.events[e.index()]) {
            if existing.slot == slot {
                return Err(ConfigError::DuplicateSlot(slot));
            }
            if existing.spec.trigger_code == spec.trigger_code {
                return Err(ConfigError::DuplicateTriggerCode(spec.trigger_code));
            }
        }
        if owner.slots.is_full() {
            return Err(ConfigError::CapacityExceeded("slot"));
        }

        let id = EventId(self.events.len() as u8);
        self.events
            .push(EventBinding {
                sensor,
                zone,
                slot,
                spec,
            })
            .map_err(|_| ConfigError::CapacityExceeded("event"))?;
        // Capacity checked above.
        let _ = self.sensors[sensor.index()].slots.push(id);
        Ok(id)
    }

    /// Handle of an already registered zone.
    pub fn zone_id(&self, topic: &str) -> Option<ZoneId> {
        self.zones
            .iter()
            .position(|z| z.topic.as_str() == topic)
            .map(|i| ZoneId(i as u8))
    }

    /// Freeze the tables.  Zones left incomplete stay unreachable.
    pub fn finish(self) -> Registry {
        for zone in self.zones.iter().filter(|z| !z.is_complete()) {
            warn!("Registry: zone '{}' incomplete, no events bound", zone.topic);
        }
        info!(
            "Registry: {} zones, {} sensors, {} events",
            self.zones.len(),
            self.sensors.len(),
            self.events.len()
        );
        Registry {
            zones: self.zones,
            sensors: self.sensors,
            events: self.events,
        }
    }
}

// ── Frozen registry ───────────────────────────────────────────

/// Immutable configuration tables.  Handles must come from the builder
/// that produced this registry.
pub struct Registry {
    zones: Vec<Zone, MAX_ZONES>,
    sensors: Vec<Sensor, MAX_SENSORS>,
    events: Vec<EventBinding, MAX_EVENTS>,
}

impl Registry {
    pub fn zone(&self, id: ZoneId) -> &Zone {
        &self.zones[id.index()]
    }

    pub fn sensor(&self, id: SensorId) -> &Sensor {
        &self.sensors[id.index()]
    }

    pub fn event(&self, id: EventId) -> &EventBinding {
        &self.events[id.index()]
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Validate a raw event index (e.g. read back from storage).
    pub fn event_id(&self, raw: u8) -> Option<EventId> {
        ((raw as usize) < self.events.len()).then_some(EventId(raw))
    }

    pub fn event_ids(&self) -> impl Iterator<Item = EventId> + '_ {
        (0..self.events.len()).map(|i| EventId(i as u8))
    }

    pub fn find_sensor(&self, kind: SensorKind, address: u32) -> Option<SensorId> {
        self.sensors
            .iter()
            .position(|s| s.kind == kind && s.address == address)
            .map(|i| SensorId(i as u8))
    }

    pub fn zone_by_topic(&self, topic: &str) -> Option<ZoneId> {
        self.zones
            .iter()
            .position(|z| z.topic.as_str() == topic)
            .map(|i| ZoneId(i as u8))
    }

    pub fn sensor_by_topic(&self, topic: &str) -> Option<SensorId> {
        self.sensors
            .iter()
            .position(|s| s.topic.as_str() == topic)
            .map(|i| SensorId(i as u8))
    }

    /// Event bound to `sensor` in `slot`.
    pub fn slot(&self, sensor: SensorId, slot: u8) -> Option<EventId> {
        self.sensor(sensor)
            .events()
            .iter()
            .copied()
            .find(|e| self.event(*e).slot == slot)
    }

    /// Wired sensors, for the input poller.
    pub fn wired_sensors(&self) -> impl Iterator<Item = &Sensor> + '_ {
        self.sensors
            .iter()
            .filter(|s| s.kind == SensorKind::WiredDigital)
    }
}
