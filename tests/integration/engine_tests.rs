//! Engine behaviour over time: timers, policies, persistence and the queue.

use homealarm::alarm::registry::EventSpec;
use homealarm::alarm::state::{PersistedState, STATE_KEY, STATE_NAMESPACE};
use homealarm::alarm::{EventKind, EventPhase, Mode, ResponseKind};
use homealarm::app::commands::AdminCommand;
use homealarm::app::events::AlarmEvent;
use homealarm::config::AlarmConfig;
use homealarm::error::{ResourceError, SignalError};
use homealarm::events::{QUEUE_DEPTH, Signal, SignalQueue};
use homealarm::layout::{ZoneResponses, default_layout};

use crate::harness::*;
use crate::mock_io::{MockIo, OutputCall};

fn dispatched(panel: &Panel) -> usize {
    panel
        .io
        .count_events(|e| matches!(e, AlarmEvent::Dispatched { .. }))
}

// ── Threshold window ──────────────────────────────────────────

#[test]
fn late_second_frame_restarts_the_count() {
    let mut panel = Panel::new();

    panel.rf(RC, RC_ON, 1_000);
    // 3.1 s later: the first window has lapsed, this frame counts as one.
    panel.rf(RC, RC_ON, 4_100);
    assert_eq!(panel.service.mode(), Mode::Disabled);
    assert_eq!(panel.phase("rc", 1), EventPhase::Pending);

    // The lapsed window's timer must not reset the new count.
    panel.rf(RC, RC_ON, 4_300);
    assert_eq!(panel.service.mode(), Mode::Armed);
}

// ── Auto-reset ────────────────────────────────────────────────

#[test]
fn smoke_auto_resets_after_a_minute() {
    let mut panel = Panel::new();

    panel.rf(SMOKE, 0x09, 1_000);
    assert_eq!(panel.phase("smoke", 0), EventPhase::Active);
    // Fire zone is silent while disabled: counted, not announced.
    assert_eq!(panel.service.alarm_count(), 1);
    assert!(panel.io.notifications.is_empty());
    assert!(!panel.service.siren_active());

    panel.tick(60_999);
    assert_eq!(panel.phase("smoke", 0), EventPhase::Active);

    panel.tick(61_000);
    assert_eq!(panel.phase("smoke", 0), EventPhase::Idle);
    // No cancel text configured: the default names sensor and kind.
    assert_eq!(panel.io.messages(), vec!["Smoke: alarm cleared"]);
    assert_eq!(dispatched(&panel), 2);
}

#[test]
fn retrigger_extends_auto_reset() {
    let mut panel = Panel::new();
    panel.rf(SMOKE, 0x09, 1_000);
    panel.rf(SMOKE, 0x09, 30_000);
    assert_eq!(dispatched(&panel), 1, "re-trigger while active is not a new alarm");

    panel.tick(61_000);
    assert_eq!(panel.phase("smoke", 0), EventPhase::Active);
    panel.tick(90_000);
    assert_eq!(panel.phase("smoke", 0), EventPhase::Idle);
}

#[test]
fn explicit_cancel_disarms_auto_reset() {
    let mut layout = default_layout();
    let smoke = layout
        .sensors
        .iter_mut()
        .find(|s| s.topic == "smoke")
        .unwrap();
    smoke.events[0].spec = EventSpec::new(EventKind::Alarm, 0x09)
        .message("Smoke detected")
        .cancel(0x0A, Some("Smoke cleared"))
        .auto_reset_ms(60_000);
    let mut panel = Panel::with_registry(layout.build(), AlarmConfig::default(), MockIo::new());

    panel.rf(SMOKE, 0x09, 1_000);
    panel.rf(SMOKE, 0x0A, 5_000);
    assert_eq!(panel.phase("smoke", 0), EventPhase::Idle);
    assert_eq!(panel.io.messages(), vec!["Smoke cleared"]);

    panel.tick(61_000);
    panel.tick(120_000);
    assert_eq!(dispatched(&panel), 2, "no second cancel from the auto-reset");
}

#[test]
fn siren_cancel_response_sounds_on_auto_reset() {
    let mut layout = default_layout();
    let tamper = layout
        .zones
        .iter_mut()
        .find(|z| z.topic == "tamper")
        .unwrap();
    tamper.responses = ZoneResponses::always(ResponseKind::Register, ResponseKind::AlarmSiren);
    let mut panel = Panel::with_registry(layout.build(), AlarmConfig::default(), MockIo::new());

    panel.rf(ROOM1_PIR, 0x0D, 1_000);
    assert_eq!(panel.phase("room1/pir", 1), EventPhase::Active);
    assert!(!panel.service.siren_active());

    panel.tick(301_000);
    assert_eq!(panel.phase("room1/pir", 1), EventPhase::Idle);
    assert!(panel.service.siren_active());
    assert!(panel.io.siren_on());
    assert!(panel.io.strobe_on());
    assert_eq!(panel.io.messages(), vec!["Room 1: tamper cleared"]);
    assert_eq!(panel.service.alarm_count(), 0, "cancels are not counted");

    // The siren still times out.
    panel.tick(481_000);
    assert!(!panel.service.siren_active());
}

// ── Republish ─────────────────────────────────────────────────

#[test]
fn active_event_is_republished_periodically() {
    let mut panel = Panel::new();
    let topic = "home/security/events/doors";
    let local = "local/home/security/door/status";

    panel.wired(DOOR_PIN, 1, 1_000);
    assert_eq!(panel.io.on_topic(topic).len(), 1);

    panel.tick(60_999);
    assert_eq!(panel.io.on_topic(topic).len(), 1);
    panel.tick(61_000);
    assert_eq!(panel.io.on_topic(topic).len(), 2);
    assert_eq!(panel.io.on_topic(local).len(), 2);
    panel.tick(121_000);
    assert_eq!(panel.io.on_topic(topic).len(), 3);

    // Republishing never re-runs the response.
    assert_eq!(dispatched(&panel), 1);

    panel.wired(DOOR_PIN, 0, 130_000);
    assert_eq!(panel.io.on_topic(topic).len(), 4);
    panel.tick(181_000);
    assert_eq!(panel.io.on_topic(topic).len(), 4, "cleared events stay quiet");
}

// ── Siren ─────────────────────────────────────────────────────

#[test]
fn siren_switches_off_after_its_duration() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);
    assert!(panel.io.siren_on());

    panel.tick(189_999);
    assert!(panel.io.siren_on());

    panel.tick(190_000);
    assert!(!panel.io.siren_on());
    assert!(!panel.io.strobe_on());
    assert!(!panel.service.siren_active());
    // The event itself stays active; only the noise stops.
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
    assert_eq!(panel.service.mode(), Mode::Armed);
    let status = panel.io.last_on(STATUS_TOPIC).unwrap();
    assert!(status.contains(r#""siren":false"#), "got {status}");
}

#[test]
fn new_alarm_extends_sounding_siren() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);
    panel.wired(DOOR_PIN, 0, 90_000);
    panel.wired(DOOR_PIN, 1, 100_000);
    assert_eq!(panel.io.siren_switches(), 1, "already sounding");

    panel.tick(190_000);
    assert!(panel.service.siren_active());
    panel.tick(280_000);
    assert!(!panel.service.siren_active());
}

// ── Remote disarm policy ──────────────────────────────────────

#[test]
fn remote_off_silences_and_disarms_by_default() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);

    panel.press(RC_OFF, 20_000);
    assert!(!panel.service.siren_active());
    assert!(!panel.io.siren_on());
    assert_eq!(panel.service.mode(), Mode::Disabled);
}

#[test]
fn remote_off_only_silences_when_configured() {
    let config = AlarmConfig {
        remote_disarm_silences: false,
        ..AlarmConfig::default()
    };
    let mut panel = Panel::with_config(config);
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);

    panel.press(RC_OFF, 20_000);
    assert!(!panel.service.siren_active());
    assert_eq!(panel.service.mode(), Mode::Armed, "first press only silences");

    panel.press(RC_OFF, 30_000);
    assert_eq!(panel.service.mode(), Mode::Disabled);
}

#[test]
fn arming_resets_alarm_counter() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);
    assert_eq!(panel.service.alarm_count(), 1);

    panel.press(RC_OFF, 20_000);
    assert_eq!(panel.service.alarm_count(), 1, "disarming keeps the count");
    panel.arm(30_000);
    assert_eq!(panel.service.alarm_count(), 0);
}

// ── Undefined signals ─────────────────────────────────────────

#[test]
fn unknown_sensor_is_reported_not_notified_by_default() {
    let mut panel = Panel::new();
    panel.rf(0x0001_2345, 0x01, 1_000);
    assert_eq!(
        panel.io.count_events(|e| matches!(
            e,
            AlarmEvent::Undefined(SignalError::UnknownSensor {
                address: 0x0001_2345,
                ..
            })
        )),
        1
    );
    assert!(panel.io.notifications.is_empty());
    assert_eq!(dispatched(&panel), 0);
}

#[test]
fn unknown_command_from_known_sensor() {
    let mut panel = Panel::new();
    panel.rf(SMOKE, 0x03, 1_000);
    assert_eq!(
        panel.io.count_events(|e| matches!(
            e,
            AlarmEvent::Undefined(SignalError::UnknownCommand { code: 0x03, .. })
        )),
        1
    );
    assert_eq!(panel.phase("smoke", 0), EventPhase::Idle);
}

#[test]
fn undefined_sensor_notifications_are_rate_limited() {
    let config = AlarmConfig {
        notify_undefined_sensor: true,
        ..AlarmConfig::default()
    };
    let mut panel = Panel::with_config(config);
    for i in 0..10 {
        panel.rf(0x0001_2345, 0x01, 1_000 + i);
    }
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::Undefined(_))),
        10
    );
    assert_eq!(panel.io.notifications.len(), 3, "burst capped");

    // The bucket refills at one per second of engine time.
    panel.rf(0x0001_2345, 0x01, 3_009);
    panel.rf(0x0001_2345, 0x01, 3_010);
    assert_eq!(panel.io.notifications.len(), 5);
    panel.rf(0x0001_2345, 0x01, 3_011);
    assert_eq!(panel.io.notifications.len(), 5);
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn mode_and_active_events_survive_restart() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);
    assert!(panel.service.siren_active());

    let mut panel = panel.reboot();
    assert_eq!(panel.service.mode(), Mode::Armed);
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
    assert_eq!(panel.service.alarm_count(), 1);
    assert!(!panel.service.siren_active(), "siren never resumes after reboot");
    assert_eq!(panel.io.siren_switches(), 0);
    assert_eq!(panel.io.armed_led(), Some(true));
    assert_eq!(
        panel.io.count_events(|e| matches!(
            e,
            AlarmEvent::Started {
                mode: Mode::Armed,
                restored_active: 1
            }
        )),
        1
    );

    // The restored event clears normally.
    panel.wired(DOOR_PIN, 0, 1_000);
    assert_eq!(panel.phase("door", 0), EventPhase::Idle);
}

#[test]
fn restored_event_reasserts_relay_and_local_status() {
    let layout = || {
        let mut layout = default_layout();
        let doors = layout.zones.iter_mut().find(|z| z.topic == "doors").unwrap();
        doors.relay = Some(3);
        layout.build()
    };
    let mut panel = Panel::with_registry(layout(), AlarmConfig::default(), MockIo::new());
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);
    assert!(panel.io.outputs.contains(&OutputCall::Relay(3, true)));

    let panel = Panel::with_registry(layout(), AlarmConfig::default(), panel.io.rebooted());
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
    assert!(panel.io.outputs.contains(&OutputCall::Relay(3, true)));
    assert_eq!(panel.io.last_on("local/home/security/door/status"), Some("1"));
    assert_eq!(panel.io.siren_switches(), 0);
}

#[test]
fn corrupt_state_boots_disabled() {
    let mut io = MockIo::new();
    io.store.insert(
        format!("{STATE_NAMESPACE}::{STATE_KEY}"),
        vec![0xFF, 0xFF, 0xFF],
    );
    let panel = Panel::boot(AlarmConfig::default(), io);
    assert_eq!(panel.service.mode(), Mode::Disabled);
    assert_eq!(panel.service.active_count(), 0);
}

#[test]
fn stale_event_index_in_storage_is_skipped() {
    let mut io = MockIo::new();
    let saved = PersistedState::new(Mode::Perimeter, 2, [0u8, 250].into_iter());
    saved.save(&mut io).unwrap();

    let panel = Panel::boot(AlarmConfig::default(), io);
    assert_eq!(panel.service.mode(), Mode::Perimeter);
    assert_eq!(panel.service.active_count(), 1);
}

#[test]
fn storage_failure_does_not_stop_the_alarm() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.io.fail_writes = true;
    panel.wired(DOOR_PIN, 1, 10_000);
    assert!(panel.service.siren_active());
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
}

// ── Administrative overrides ──────────────────────────────────

#[test]
fn silence_keeps_mode_and_events() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);

    panel.admin(AdminCommand::SilenceSiren, 11_000);
    assert!(!panel.io.siren_on());
    assert_eq!(panel.service.mode(), Mode::Armed);
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
}

#[test]
fn force_clear_idles_everything() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.wired(DOOR_PIN, 1, 10_000);
    panel.rf(ROOM1_PIR, PIR_MOTION, 11_000);
    assert_eq!(panel.phase("room1/pir", 0), EventPhase::AwaitingConfirmation);
    let before = dispatched(&panel);

    panel.admin(AdminCommand::ForceClear, 12_000);
    assert_eq!(panel.phase("door", 0), EventPhase::Idle);
    assert_eq!(panel.phase("room1/pir", 0), EventPhase::Idle);
    assert_eq!(panel.service.active_count(), 0);
    assert!(!panel.service.siren_active());
    assert_eq!(panel.service.mode(), Mode::Armed);
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::ForcedClear { cleared: 2 })),
        1
    );
    assert_eq!(dispatched(&panel), before, "no cancel responses");

    // Nothing left to fire.
    panel.tick(200_000);
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::Unconfirmed { .. })),
        0
    );
}

#[test]
fn publish_status_on_request() {
    let mut panel = Panel::new();
    let before = panel.io.on_topic(STATUS_TOPIC).len();
    panel.admin(AdminCommand::PublishStatus, 1_000);
    assert_eq!(panel.io.on_topic(STATUS_TOPIC).len(), before + 1);
    let status = panel.io.last_on(STATUS_TOPIC).unwrap();
    assert!(status.contains(r#""status":"Security disabled""#), "got {status}");
}

// ── Queue ─────────────────────────────────────────────────────

fn status_request() -> Signal {
    Signal::Admin {
        command: AdminCommand::PublishStatus,
        at_ms: 0,
    }
}

#[test]
fn full_queue_drops_and_reports() {
    let mut panel = Panel::new();
    for _ in 0..QUEUE_DEPTH {
        panel.queue.post(status_request()).unwrap();
    }
    assert_eq!(panel.queue.post(status_request()), Err(ResourceError::QueueFull));

    assert_eq!(panel.tick(1_000), QUEUE_DEPTH);
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::SignalsDropped(1))),
        1
    );
    assert!(panel.queue.post(status_request()).is_ok());
}

#[test]
fn shutdown_drains_then_rejects() {
    let mut panel = Panel::new();
    let queue = SignalQueue::new();
    queue
        .post(Signal::Input(homealarm::events::InputSignal {
            kind: homealarm::alarm::SensorKind::WiredDigital,
            address: DOOR_PIN,
            code: 1,
            at_ms: 1_000,
        }))
        .unwrap();

    panel.service.shutdown(&queue, &mut panel.io);
    assert!(panel.service.is_stopped());
    assert_eq!(panel.phase("door", 0), EventPhase::Active, "queued signal processed");
    assert_eq!(panel.service.pending_timers(), 0);
    assert_eq!(queue.post(status_request()), Err(ResourceError::QueueClosed));
    assert_eq!(
        panel.io.count_events(|e| matches!(e, AlarmEvent::Stopped)),
        1
    );
    assert_eq!(panel.service.run_once(&queue, 2_000, &mut panel.io), 0);

    // What was drained is on flash for the next boot.
    let panel = panel.reboot();
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
}
