//! Resolve a (sensor, code) pair to one of the sensor's event slots.

use super::Direction;
use super::registry::{EventId, Registry, SensorId};

/// Outcome of matching a code against a sensor's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    Event(EventId, Direction),
    /// No slot knows this code; reported as an undefined command.
    Unmatched,
}

/// Scan the sensor's slots in registration order; the first slot whose
/// trigger or cancel code equals `code` wins.
pub fn match_code(registry: &Registry, sensor: SensorId, code: u32) -> Match {
    for &id in registry.sensor(sensor).events() {
        let spec = &registry.event(id).spec;
        if spec.trigger_code == code {
            return Match::Event(id, Direction::Trigger);
        }
        if spec.cancel_code == Some(code) {
            return Match::Event(id, Direction::Cancel);
        }
    }
    Match::Unmatched
}
