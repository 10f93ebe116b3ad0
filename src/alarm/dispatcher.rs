//! Response execution.
//!
//! The dispatcher turns a confirmed trigger or cancel into side effects:
//! siren and strobe, zone relays, notifications, published state, and for
//! remote controls a mode transition.  It owns the siren state, the alarm
//! counter and the last dispatched event shown in the status snapshot.
//!
//! | Response      | Trigger                              | Cancel                            |
//! |---------------|--------------------------------------|-----------------------------------|
//! | `Register`    | publish                              | relay off, publish                |
//! | `AlarmSiren`  | siren, relay, notify, publish, count | siren, relay off, notify, publish |
//! | `AlarmNotify` | relay, notify, publish, count        | relay off, notify, publish        |
//! | `AlarmSilent` | publish, count                       | relay off, publish                |
//! | `Control`     | mode transition only                 | ignored                           |
//!
//! "siren" means siren plus strobe with a timeout.  Only triggers count
//! alarms or change the mode.

use core::fmt::Write;

use log::{debug, info, warn};
use serde::Serialize;

use super::mode::{ModeChange, ModeController};
use super::registry::{EventBinding, EventId, Sensor, Zone};
use super::{Direction, EventKind, Message, Mode, ResponseKind, bounded};
use crate::app::events::{AlarmEvent, LastEvent, StatusSnapshot};
use crate::app::ports::AlarmIo;
use crate::config::AlarmConfig;
use crate::timers::{TimerQueue, TimerTag};

type Topic = heapless::String<96>;

/// Everything the dispatcher needs to know about one event occurrence.
pub struct Dispatch<'a> {
    pub event: EventId,
    pub binding: &'a EventBinding,
    pub sensor: &'a Sensor,
    pub zone: &'a Zone,
    pub direction: Direction,
    pub now_ms: u32,
}

impl Dispatch<'_> {
    /// Configured text, else the sensor name (trigger) or
    /// `"<sensor>: <kind> cleared"` (cancel).
    fn message(&self) -> Message {
        let spec = &self.binding.spec;
        match (self.direction, self.direction_text()) {
            (_, Some(text)) => bounded(text),
            (Direction::Trigger, None) => bounded(&self.sensor.name),
            (Direction::Cancel, None) => {
                let mut text = Message::new();
                let _ = write!(text, "{}: {} cleared", self.sensor.name, spec.kind.as_str());
                text
            }
        }
    }

    fn direction_text(&self) -> Option<&str> {
        let spec = &self.binding.spec;
        match self.direction {
            Direction::Trigger => spec.trigger_message.as_deref(),
            Direction::Cancel => spec.cancel_message.as_deref(),
        }
    }
}

/// What a dispatch did, for the caller's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub response: Option<ResponseKind>,
    pub mode_change: Option<ModeChange>,
}

#[derive(Serialize)]
struct EventPayload<'a> {
    sensor: &'a str,
    zone: &'a str,
    event: &'static str,
    state: &'static str,
    response: ResponseKind,
    mode: Mode,
    message: &'a str,
    time_ms: u32,
}

pub struct ResponseDispatcher {
    location: heapless::String<24>,
    qos: u8,
    notify_alarm: bool,
    notify_mode_change: bool,
    remote_disarm_silences: bool,
    siren_duration_ms: u32,
    siren_on: bool,
    siren_token: u16,
    alarms: u32,
    last_event: Option<LastEvent>,
}

impl ResponseDispatcher {
    pub fn new(config: &AlarmConfig) -> Self {
        Self {
            location: config.location.clone(),
            qos: config.publish_qos,
            notify_alarm: config.notify_alarm,
            notify_mode_change: config.notify_mode_change,
            remote_disarm_silences: config.remote_disarm_silences,
            siren_duration_ms: config.siren_duration_ms,
            siren_on: false,
            siren_token: 0,
            alarms: 0,
            last_event: None,
        }
    }

    pub fn siren_on(&self) -> bool {
        self.siren_on
    }

    pub fn alarms(&self) -> u32 {
        self.alarms
    }

    pub fn last_event(&self) -> Option<&LastEvent> {
        self.last_event.as_ref()
    }

    pub(crate) fn restore_alarms(&mut self, alarms: u32) {
        self.alarms = alarms;
    }

    /// Look up the zone's response for the current mode and execute it.
    pub fn execute(
        &mut self,
        d: &Dispatch<'_>,
        modes: &mut ModeController,
        timers: &mut TimerQueue,
        io: &mut impl AlarmIo,
    ) -> Outcome {
        let mode = modes.current();
        let Some(response) = d.zone.response(mode, d.direction) else {
            warn!(
                "Dispatcher: zone '{}' has no response for {:?}",
                d.zone.topic, mode
            );
            return Outcome::default();
        };

        if d.sensor.local_publish {
            self.publish_local(d, io);
        }

        let mut outcome = Outcome {
            response: Some(response),
            mode_change: None,
        };

        match (d.direction, response) {
            (Direction::Trigger, ResponseKind::Control) => {
                outcome.mode_change = self.control(d, modes, timers, io);
            }
            (Direction::Trigger, _) => self.trigger(d, response, mode, timers, io),
            (Direction::Cancel, ResponseKind::Control) => {
                debug!("Dispatcher: control '{}' ignored on cancel", d.sensor.topic);
            }
            (Direction::Cancel, _) => self.cancel(d, response, mode, timers, io),
        }

        io.emit(&AlarmEvent::Dispatched {
            event: d.event,
            sensor: d.sensor.name.clone(),
            zone: d.zone.name.clone(),
            direction: d.direction,
            response,
            mode: modes.current(),
        });
        outcome
    }

    fn trigger(
        &mut self,
        d: &Dispatch<'_>,
        response: ResponseKind,
        mode: Mode,
        timers: &mut TimerQueue,
        io: &mut impl AlarmIo,
    ) {
        info!(
            "Dispatcher: {} '{}' in '{}' -> {:?}",
            d.binding.spec.kind.as_str(),
            d.sensor.name,
            d.zone.name,
            response
        );
        match response {
            ResponseKind::AlarmSiren => {
                self.sound_siren(d.now_ms, timers, io);
                self.switch_relay(d.zone, true, io);
                self.alert(d, io);
            }
            ResponseKind::AlarmNotify => {
                self.switch_relay(d.zone, true, io);
                self.alert(d, io);
            }
            ResponseKind::AlarmSilent | ResponseKind::Register | ResponseKind::Control => {}
        }
        if response.is_alarm() {
            self.alarms = self.alarms.saturating_add(1);
            self.last_event = Some(LastEvent {
                sensor: d.sensor.name.clone(),
                zone: d.zone.name.clone(),
                time_ms: d.now_ms,
            });
        }
        self.publish_event(d, response, mode, io);
    }

    fn cancel(
        &mut self,
        d: &Dispatch<'_>,
        response: ResponseKind,
        mode: Mode,
        timers: &mut TimerQueue,
        io: &mut impl AlarmIo,
    ) {
        info!(
            "Dispatcher: {} '{}' in '{}' cleared -> {:?}",
            d.binding.spec.kind.as_str(),
            d.sensor.name,
            d.zone.name,
            response
        );
        self.switch_relay(d.zone, false, io);
        match response {
            ResponseKind::AlarmSiren => {
                self.sound_siren(d.now_ms, timers, io);
                self.alert(d, io);
            }
            ResponseKind::AlarmNotify => self.alert(d, io),
            ResponseKind::AlarmSilent | ResponseKind::Register | ResponseKind::Control => {}
        }
        self.publish_event(d, response, mode, io);
    }

    fn control(
        &mut self,
        d: &Dispatch<'_>,
        modes: &mut ModeController,
        timers: &mut TimerQueue,
        io: &mut impl AlarmIo,
    ) -> Option<ModeChange> {
        let Some(requested) = d.binding.spec.kind.requested_mode() else {
            warn!(
                "Dispatcher: '{}' has a control response but {:?} requests no mode",
                d.sensor.topic, d.binding.spec.kind
            );
            return None;
        };

        if requested == Mode::Disabled && self.siren_on {
            self.silence(timers, io);
            if !self.remote_disarm_silences {
                info!("Dispatcher: siren silenced, mode kept at {:?}", modes.current());
                return None;
            }
        }

        let change = modes.transition(requested)?;
        self.on_mode_change(change, io);
        Some(change)
    }

    /// Side effects of a committed mode change.
    fn on_mode_change(&mut self, change: ModeChange, io: &mut impl AlarmIo) {
        if change.arms() {
            self.alarms = 0;
        }
        io.set_armed_led(change.to != Mode::Disabled);
        if self.notify_mode_change {
            io.notify(change.to.status_text(), "", control_kind(change.to));
        }
        let mut topic = Topic::new();
        let _ = write!(topic, "{}/config/security/mode", self.location);
        let mut payload: heapless::String<4> = heapless::String::new();
        let _ = write!(payload, "{}", change.to as u8);
        io.publish(&topic, &payload, self.qos, true);
        io.emit(&AlarmEvent::ModeChanged {
            from: change.from,
            to: change.to,
        });
    }

    // ── Siren ─────────────────────────────────────────────────

    fn sound_siren(&mut self, now_ms: u32, timers: &mut TimerQueue, io: &mut impl AlarmIo) {
        self.siren_token = self.siren_token.wrapping_add(1);
        let tag = TimerTag::Siren {
            token: self.siren_token,
        };
        if !timers.arm(tag, now_ms, self.siren_duration_ms) {
            warn!("Dispatcher: siren timeout not armed, timer queue full");
        }
        if self.siren_on {
            debug!("Dispatcher: siren already on, timeout extended");
            return;
        }
        self.siren_on = true;
        io.set_siren(true);
        io.set_strobe(true);
        io.emit(&AlarmEvent::SirenChanged { on: true });
    }

    /// Switch siren and strobe off.  Returns `false` if they were already off.
    pub fn silence(&mut self, timers: &mut TimerQueue, io: &mut impl AlarmIo) -> bool {
        if !self.siren_on {
            return false;
        }
        self.siren_on = false;
        self.siren_token = self.siren_token.wrapping_add(1);
        timers.cancel_siren();
        io.set_siren(false);
        io.set_strobe(false);
        info!("Dispatcher: siren off");
        io.emit(&AlarmEvent::SirenChanged { on: false });
        true
    }

    /// Handle an expired siren timer.  Returns `false` for a stale token.
    pub fn siren_timeout(&mut self, token: u16, timers: &mut TimerQueue, io: &mut impl AlarmIo) -> bool {
        if !self.siren_on || token != self.siren_token {
            return false;
        }
        info!("Dispatcher: siren timeout");
        self.silence(timers, io)
    }

    // ── Publishing ────────────────────────────────────────────

    /// Re-publish an active event's state without re-running its response.
    pub fn republish(&mut self, d: &Dispatch<'_>, mode: Mode, io: &mut impl AlarmIo) {
        let response = d
            .zone
            .response(mode, Direction::Trigger)
            .unwrap_or(ResponseKind::Register);
        debug!("Dispatcher: republish '{}'", d.sensor.topic);
        self.publish_event(d, response, mode, io);
        if d.sensor.local_publish {
            self.publish_local(d, io);
        }
    }

    /// Re-apply an active event's steady outputs after a restart: the zone
    /// relay and the local status topic.  The siren is never restored.
    pub fn restore_active(&self, d: &Dispatch<'_>, mode: Mode, io: &mut impl AlarmIo) {
        if matches!(
            d.zone.response(mode, Direction::Trigger),
            Some(ResponseKind::AlarmSiren | ResponseKind::AlarmNotify)
        ) {
            self.switch_relay(d.zone, true, io);
        }
        if d.sensor.local_publish {
            self.publish_local(d, io);
        }
    }

    pub fn status(&self, mode: Mode, active_events: usize) -> StatusSnapshot {
        StatusSnapshot {
            status: mode.status_text(),
            mode,
            alarms: self.alarms,
            siren: self.siren_on,
            active_events,
            event: self.last_event.clone(),
        }
    }

    pub fn publish_status(&self, snapshot: &StatusSnapshot, io: &mut impl AlarmIo) {
        let payload = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("Dispatcher: status encode failed: {}", e);
                return;
            }
        };
        let mut topic = Topic::new();
        let _ = write!(topic, "{}/security/status", self.location);
        io.publish(&topic, &payload, self.qos, true);
    }

    fn alert(&self, d: &Dispatch<'_>, io: &mut impl AlarmIo) {
        if self.notify_alarm {
            io.notify(&d.message(), &d.zone.name, d.binding.spec.kind);
        }
    }

    fn switch_relay(&self, zone: &Zone, on: bool, io: &mut impl AlarmIo) {
        if let Some(relay) = zone.relay {
            io.set_relay(relay, on);
        }
    }

    fn publish_event(&self, d: &Dispatch<'_>, response: ResponseKind, mode: Mode, io: &mut impl AlarmIo) {
        let message = d.message();
        let payload = EventPayload {
            sensor: &d.sensor.name,
            zone: &d.zone.name,
            event: d.binding.spec.kind.as_str(),
            state: match d.direction {
                Direction::Trigger => "on",
                Direction::Cancel => "off",
            },
            response,
            mode,
            message: &message,
            time_ms: d.now_ms,
        };
        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(e) => {
                warn!("Dispatcher: event encode failed: {}", e);
                return;
            }
        };
        let mut topic = Topic::new();
        let _ = write!(topic, "{}/security/events/{}", self.location, d.zone.topic);
        io.publish(&topic, &json, self.qos, false);
    }

    fn publish_local(&self, d: &Dispatch<'_>, io: &mut impl AlarmIo) {
        let topic = local_topic(&self.location, &d.sensor.topic);
        let state = match d.direction {
            Direction::Trigger => "1",
            Direction::Cancel => "0",
        };
        io.publish(&topic, state, self.qos, true);
    }
}

/// Control event that requests `mode`.
fn control_kind(mode: Mode) -> EventKind {
    match mode {
        Mode::Disabled => EventKind::CtrlOff,
        Mode::Armed => EventKind::CtrlOn,
        Mode::Perimeter => EventKind::CtrlPerimeter,
        Mode::Outbuildings => EventKind::CtrlOutbuildings,
    }
}

fn local_topic(location: &str, sensor: &str) -> Topic {
    let mut topic = Topic::new();
    let _ = write!(topic, "local/{}/security/{}/status", location, sensor);
    topic
}
