//! Log-based adapters for the outbound ports.
//!
//! [`LogEventSink`] writes structured engine events to the ESP-IDF logger
//! (UART / USB-CDC in production).  [`LogNotifier`] and [`LogPublisher`]
//! stand in for the messenger and the broker until a network adapter
//! implements the same traits; they keep the last few messages so the
//! console and tests can inspect them.

use heapless::{Deque, String};
use log::{debug, info, warn};

use crate::alarm::{EventKind, bounded};
use crate::app::events::AlarmEvent;
use crate::app::ports::{EventSink, NotifyPort, PublishPort};

/// Adapter that logs every [`AlarmEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AlarmEvent) {
        match event {
            AlarmEvent::Started {
                mode,
                restored_active,
            } => {
                info!("START | mode={:?} | restored_active={}", mode, restored_active);
            }
            AlarmEvent::Counting {
                event,
                count,
                threshold,
            } => {
                debug!("COUNT | event={:?} | {}/{}", event, count, threshold);
            }
            AlarmEvent::AwaitingConfirmation { event, zone } => {
                info!("CONFIRM? | event={:?} | zone={}", event, zone);
            }
            AlarmEvent::Unconfirmed { event, zone } => {
                info!("UNCONFIRMED | event={:?} | zone={}", event, zone);
            }
            AlarmEvent::Dispatched {
                event,
                sensor,
                zone,
                direction,
                response,
                mode,
            } => {
                info!(
                    "DISPATCH | {:?} {:?} | sensor={} zone={} | response={:?} | mode={:?}",
                    event, direction, sensor, zone, response, mode
                );
            }
            AlarmEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            AlarmEvent::SirenChanged { on } => {
                info!("SIREN | {}", if *on { "ON" } else { "OFF" });
            }
            AlarmEvent::Undefined(e) => {
                warn!("UNDEFINED | {}", e);
            }
            AlarmEvent::ForcedClear { cleared } => {
                warn!("CLEAR | forced, {} events", cleared);
            }
            AlarmEvent::SignalsDropped(n) => {
                warn!("QUEUE | {} signals dropped", n);
            }
            AlarmEvent::Stopped => {
                info!("STOP | worker stopped");
            }
        }
    }
}

/// Messages kept for inspection.
const HISTORY: usize = 8;

/// One notification as handed to the messenger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: EventKind,
    pub zone: String<48>,
    pub message: String<128>,
}

/// Notifier that logs instead of messaging.
#[derive(Default)]
pub struct LogNotifier {
    recent: Deque<Notification, HISTORY>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent notifications, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Notification> {
        self.recent.iter()
    }
}

impl NotifyPort for LogNotifier {
    fn notify(&mut self, message: &str, zone: &str, kind: EventKind) {
        info!("NOTIFY | {} | {} | {}", kind.as_str(), zone, message);
        if self.recent.is_full() {
            self.recent.pop_front();
        }
        let _ = self.recent.push_back(Notification {
            kind,
            zone: bounded(zone),
            message: bounded(message),
        });
    }
}

/// One publish as handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String<96>,
    pub payload: String<256>,
    pub retained: bool,
}

/// Publisher that logs instead of talking to a broker.
#[derive(Default)]
pub struct LogPublisher {
    recent: Deque<Publication, HISTORY>,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recent(&self) -> impl Iterator<Item = &Publication> {
        self.recent.iter()
    }

    /// Last payload published on `topic`.
    pub fn last_on(&self, topic: &str) -> Option<&str> {
        self.recent
            .iter()
            .rev()
            .find(|p| p.topic.as_str() == topic)
            .map(|p| p.payload.as_str())
    }
}

impl PublishPort for LogPublisher {
    fn publish(&mut self, topic: &str, payload: &str, qos: u8, retained: bool) {
        debug!(
            "PUBLISH | {} | qos={} retained={} | {}",
            topic, qos, retained, payload
        );
        if self.recent.is_full() {
            self.recent.pop_front();
        }
        let _ = self.recent.push_back(Publication {
            topic: bounded(topic),
            payload: bounded(payload),
            retained,
        });
    }
}
