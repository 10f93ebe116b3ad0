//! End-to-end scenarios against the default house layout.
//!
//! Each test drives the engine through the input queue exactly like the
//! worker loop does and checks what reached the outputs, the messenger and
//! the broker.

use homealarm::alarm::{EventKind, EventPhase, Mode};
use homealarm::app::events::AlarmEvent;

use crate::harness::*;

// ── Wired door ────────────────────────────────────────────────

#[test]
fn armed_door_opening_sounds_siren_and_notifies() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.io.clear();

    panel.wired(DOOR_PIN, 1, 5_000);

    assert!(panel.io.siren_on(), "siren must sound");
    assert!(panel.io.strobe_on(), "strobe must flash");
    assert!(panel.service.siren_active());
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
    assert_eq!(panel.service.alarm_count(), 1);

    assert_eq!(panel.io.notifications.len(), 1);
    let n = &panel.io.notifications[0];
    assert_eq!(n.message, "Front door opened");
    assert_eq!(n.zone, "Doors");
    assert_eq!(n.kind, EventKind::Alarm);

    let event = panel
        .io
        .last_on("home/security/events/doors")
        .expect("event published");
    assert!(event.contains(r#""state":"on""#), "got {event}");
    assert!(event.contains(r#""response":"AlarmSiren""#), "got {event}");
    assert_eq!(
        panel.io.last_on("local/home/security/door/status"),
        Some("1")
    );

    let status = panel.io.last_on(STATUS_TOPIC).expect("status published");
    assert!(status.contains(r#""siren":true"#), "got {status}");
    assert!(status.contains(r#""alarms":1"#), "got {status}");
}

#[test]
fn disabled_door_opening_only_registers() {
    let mut panel = Panel::new();
    panel.io.clear();

    panel.wired(DOOR_PIN, 1, 1_000);

    assert_eq!(panel.service.mode(), Mode::Disabled);
    assert_eq!(panel.io.siren_switches(), 0, "no siren while disabled");
    assert!(panel.io.notifications.is_empty(), "no notification while disabled");
    assert_eq!(panel.phase("door", 0), EventPhase::Active);
    assert_eq!(panel.service.alarm_count(), 0);

    let events = panel.io.on_topic("home/security/events/doors");
    assert_eq!(events.len(), 1);
    assert!(events[0].payload.contains(r#""response":"Register""#));
    assert!(!events[0].retained);

    // Closing the door clears the event.
    panel.wired(DOOR_PIN, 0, 2_000);
    assert_eq!(panel.phase("door", 0), EventPhase::Idle);
    let event = panel.io.last_on("home/security/events/doors").unwrap();
    assert!(event.contains(r#""state":"off""#), "got {event}");
    assert_eq!(
        panel.io.last_on("local/home/security/door/status"),
        Some("0")
    );
}

#[test]
fn perimeter_mode_guards_doors_but_not_rooms() {
    let mut panel = Panel::new();
    panel.press(RC_PERIMETER, 1_000);
    assert_eq!(panel.service.mode(), Mode::Perimeter);

    panel.wired(HALLWAY_PIN, 1, 5_000);
    assert_eq!(panel.phase("hallway", 0), EventPhase::Active);
    assert!(!panel.service.siren_active(), "people inside may move around");

    panel.wired(DOOR_PIN, 1, 6_000);
    assert!(panel.service.siren_active());
}

// ── Remote control ────────────────────────────────────────────

#[test]
fn two_frames_within_window_arm_exactly_once() {
    let mut panel = Panel::new();
    panel.io.clear();

    panel.rf(RC, RC_ON, 1_000);
    assert_eq!(panel.service.mode(), Mode::Disabled, "one frame is not enough");
    assert_eq!(panel.phase("rc", 1), EventPhase::Pending);

    panel.rf(RC, RC_ON, 2_500);
    assert_eq!(panel.service.mode(), Mode::Armed);
    assert_eq!(panel.phase("rc", 1), EventPhase::Idle, "controls are momentary");
    assert_eq!(panel.io.mode_changes(), 1);
    assert_eq!(panel.io.last_on(MODE_TOPIC), Some("1"));
    assert!(panel.io.on_topic(MODE_TOPIC)[0].retained);
    assert_eq!(panel.io.armed_led(), Some(true));
    assert_eq!(panel.io.messages(), vec!["Security armed"]);

    // Holding the button longer re-requests the current mode: no change.
    panel.rf(RC, RC_ON, 2_700);
    panel.rf(RC, RC_ON, 2_900);
    assert_eq!(panel.io.mode_changes(), 1);
    assert_eq!(panel.io.messages().len(), 1);
}

#[test]
fn single_frame_lapses_without_effect() {
    let mut panel = Panel::new();

    panel.rf(RC, RC_ON, 1_000);
    panel.tick(3_999);
    assert_eq!(panel.phase("rc", 1), EventPhase::Pending);

    panel.tick(4_000);
    assert_eq!(panel.phase("rc", 1), EventPhase::Idle);
    assert_eq!(panel.service.mode(), Mode::Disabled);

    // The next frame starts counting from scratch.
    panel.rf(RC, RC_ON, 4_500);
    assert_eq!(panel.service.mode(), Mode::Disabled);
    assert_eq!(panel.phase("rc", 1), EventPhase::Pending);
}

#[test]
fn remote_off_disarms() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.press(RC_OFF, 5_000);
    assert_eq!(panel.service.mode(), Mode::Disabled);
    assert_eq!(panel.io.armed_led(), Some(false));
    assert_eq!(panel.io.last_on(MODE_TOPIC), Some("0"));
    assert_eq!(panel.io.messages().last(), Some(&"Security disabled"));
}

#[test]
fn panic_button_sounds_siren_even_when_disabled() {
    let mut panel = Panel::new();
    panel.press(RC_PANIC, 1_000);
    assert_eq!(panel.service.mode(), Mode::Disabled);
    assert!(panel.service.siren_active());
    assert_eq!(panel.io.messages(), vec!["Panic button pressed"]);
    assert_eq!(panel.io.notifications[0].zone, "Panic buttons");
}

// ── Confirmation ──────────────────────────────────────────────

#[test]
fn single_motion_report_stays_unconfirmed() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.io.clear();

    panel.rf(ROOM1_PIR, PIR_MOTION, 10_000);
    assert_eq!(panel.phase("room1/pir", 0), EventPhase::AwaitingConfirmation);
    assert!(!panel.service.siren_active(), "one report must not escalate");
    assert!(panel.io.notifications.is_empty());
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::AwaitingConfirmation { .. })),
        1
    );

    panel.tick(69_999);
    assert_eq!(panel.phase("room1/pir", 0), EventPhase::AwaitingConfirmation);

    panel.tick(70_000);
    assert_eq!(panel.phase("room1/pir", 0), EventPhase::Idle);
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::Unconfirmed { .. })),
        1
    );
    assert_eq!(panel.io.siren_switches(), 0);
    assert_eq!(panel.service.alarm_count(), 0);
}

#[test]
fn second_motion_report_in_window_escalates() {
    let mut panel = Panel::new();
    panel.arm(1_000);
    panel.io.clear();

    panel.rf(ROOM1_PIR, PIR_MOTION, 10_000);
    panel.rf(ROOM1_PIR, PIR_MOTION, 20_000);

    assert_eq!(panel.phase("room1/pir", 0), EventPhase::Active);
    assert!(panel.service.siren_active());
    assert_eq!(panel.io.messages(), vec!["Motion detected"]);
    assert_eq!(panel.io.notifications[0].zone, "Indoor");
    assert_eq!(
        panel.io.last_on("local/home/security/room1/pir/status"),
        Some("1")
    );

    // The grace window was consumed: its timer never reports.
    panel.tick(70_000);
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::Unconfirmed { .. })),
        0
    );
}

#[test]
fn sibling_sensor_in_same_zone_confirms() {
    let mut panel = Panel::new();
    panel.arm(1_000);

    panel.external(0xFF00_0001, 1, 10_000);
    assert_eq!(panel.phase("toilet_pir", 0), EventPhase::AwaitingConfirmation);

    panel.external(0xFF00_0002, 1, 15_000);
    assert_eq!(panel.phase("kitchen_pir", 0), EventPhase::Active);
    assert_eq!(panel.phase("toilet_pir", 0), EventPhase::Idle);
    assert!(panel.service.siren_active());
}

#[test]
fn disabled_motion_registers_without_confirmation() {
    let mut panel = Panel::new();
    panel.rf(ROOM1_PIR, PIR_MOTION, 1_000);
    assert_eq!(panel.phase("room1/pir", 0), EventPhase::Active);
    assert_eq!(
        panel
            .io
            .count_events(|e| matches!(e, AlarmEvent::AwaitingConfirmation { .. })),
        0
    );
    assert!(!panel.service.siren_active());
}
