//! The panel's full port set in one value.
//!
//! The worker needs a single `&mut impl AlarmIo` per signal; `DeviceIo`
//! owns one adapter per port and forwards each call.

use crate::alarm::EventKind;
use crate::app::events::AlarmEvent;
use crate::app::ports::{
    EventSink, NotifyPort, OutputPort, PublishPort, StorageError, StoragePort,
};

use super::hardware::HardwareAdapter;
use super::log_sink::{LogEventSink, LogNotifier, LogPublisher};
use super::nvs::NvsAdapter;

pub struct DeviceIo {
    pub hw: HardwareAdapter,
    pub notifier: LogNotifier,
    pub publisher: LogPublisher,
    pub sink: LogEventSink,
    pub nvs: NvsAdapter,
}

impl DeviceIo {
    pub fn new(hw: HardwareAdapter, nvs: NvsAdapter) -> Self {
        Self {
            hw,
            notifier: LogNotifier::new(),
            publisher: LogPublisher::new(),
            sink: LogEventSink::new(),
            nvs,
        }
    }
}

impl OutputPort for DeviceIo {
    fn set_siren(&mut self, on: bool) {
        self.hw.set_siren(on);
    }

    fn set_strobe(&mut self, on: bool) {
        self.hw.set_strobe(on);
    }

    fn set_relay(&mut self, relay: u8, on: bool) {
        self.hw.set_relay(relay, on);
    }

    fn set_armed_led(&mut self, on: bool) {
        self.hw.set_armed_led(on);
    }

    fn all_off(&mut self) {
        self.hw.all_off();
    }
}

impl NotifyPort for DeviceIo {
    fn notify(&mut self, message: &str, zone: &str, kind: EventKind) {
        self.notifier.notify(message, zone, kind);
    }
}

impl PublishPort for DeviceIo {
    fn publish(&mut self, topic: &str, payload: &str, qos: u8, retained: bool) {
        self.publisher.publish(topic, payload, qos, retained);
    }
}

impl EventSink for DeviceIo {
    fn emit(&mut self, event: &AlarmEvent) {
        self.sink.emit(event);
    }
}

impl StoragePort for DeviceIo {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.nvs.read(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.nvs.write(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.nvs.delete(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.nvs.exists(namespace, key)
    }
}
