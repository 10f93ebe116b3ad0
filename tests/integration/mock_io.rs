//! Mock port set for integration tests.
//!
//! Records every output, notification, publish and engine event so tests
//! can assert on the full history without touching real GPIO or a broker.
//! Storage is an in-memory map that survives "reboots" when moved into a
//! fresh `MockIo`.

use std::collections::HashMap;

use homealarm::alarm::EventKind;
use homealarm::app::events::AlarmEvent;
use homealarm::app::ports::{
    EventSink, NotifyPort, OutputPort, PublishPort, StorageError, StoragePort,
};

// ── Output call record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCall {
    Siren(bool),
    Strobe(bool),
    Relay(u8, bool),
    ArmedLed(bool),
    AllOff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notified {
    pub message: String,
    pub zone: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retained: bool,
}

// ── MockIo ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockIo {
    pub outputs: Vec<OutputCall>,
    pub notifications: Vec<Notified>,
    pub published: Vec<Published>,
    pub events: Vec<AlarmEvent>,
    pub store: HashMap<String, Vec<u8>>,
    /// Make every storage write fail.
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same storage, empty history: what the panel sees after a reboot.
    pub fn rebooted(self) -> Self {
        Self {
            store: self.store,
            ..Self::default()
        }
    }

    /// Forget the recorded history, keep storage.
    pub fn clear(&mut self) {
        self.outputs.clear();
        self.notifications.clear();
        self.published.clear();
        self.events.clear();
    }

    pub fn siren_on(&self) -> bool {
        self.outputs
            .iter()
            .rev()
            .find_map(|c| match c {
                OutputCall::Siren(on) => Some(*on),
                OutputCall::AllOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn strobe_on(&self) -> bool {
        self.outputs
            .iter()
            .rev()
            .find_map(|c| match c {
                OutputCall::Strobe(on) => Some(*on),
                OutputCall::AllOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn siren_switches(&self) -> usize {
        self.outputs
            .iter()
            .filter(|c| matches!(c, OutputCall::Siren(true)))
            .count()
    }

    pub fn armed_led(&self) -> Option<bool> {
        self.outputs.iter().rev().find_map(|c| match c {
            OutputCall::ArmedLed(on) => Some(*on),
            _ => None,
        })
    }

    pub fn messages(&self) -> Vec<&str> {
        self.notifications.iter().map(|n| n.message.as_str()).collect()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    pub fn last_on(&self, topic: &str) -> Option<&str> {
        self.on_topic(topic).last().map(|p| p.payload.as_str())
    }

    pub fn mode_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AlarmEvent::ModeChanged { .. }))
            .count()
    }

    pub fn count_events(&self, pred: impl Fn(&AlarmEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl OutputPort for MockIo {
    fn set_siren(&mut self, on: bool) {
        self.outputs.push(OutputCall::Siren(on));
    }

    fn set_strobe(&mut self, on: bool) {
        self.outputs.push(OutputCall::Strobe(on));
    }

    fn set_relay(&mut self, relay: u8, on: bool) {
        self.outputs.push(OutputCall::Relay(relay, on));
    }

    fn set_armed_led(&mut self, on: bool) {
        self.outputs.push(OutputCall::ArmedLed(on));
    }

    fn all_off(&mut self) {
        self.outputs.push(OutputCall::AllOff);
    }
}

impl NotifyPort for MockIo {
    fn notify(&mut self, message: &str, zone: &str, kind: EventKind) {
        self.notifications.push(Notified {
            message: message.to_string(),
            zone: zone.to_string(),
            kind,
        });
    }
}

impl PublishPort for MockIo {
    fn publish(&mut self, topic: &str, payload: &str, qos: u8, retained: bool) {
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retained,
        });
    }
}

impl EventSink for MockIo {
    fn emit(&mut self, event: &AlarmEvent) {
        self.events.push(event.clone());
    }
}

impl StoragePort for MockIo {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{namespace}::{key}")) {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .insert(format!("{namespace}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{namespace}::{key}"));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{namespace}::{key}"))
    }
}
