//! A panel built from the default house layout, driven by hand.
//!
//! Time is whatever the test says it is: every helper takes the
//! millisecond timestamp of the signal and runs one worker iteration at
//! that instant.

use homealarm::alarm::registry::{EventId, Registry};
use homealarm::alarm::{EventPhase, Mode, SensorKind};
use homealarm::app::commands::AdminCommand;
use homealarm::app::service::AlarmService;
use homealarm::config::AlarmConfig;
use homealarm::events::{InputSignal, Signal, SignalQueue};
use homealarm::layout::default_layout;

use crate::mock_io::MockIo;

pub const RC: u32 = 0x0004_F9CB;
pub const RC_OFF: u32 = 0x01;
pub const RC_PANIC: u32 = 0x02;
pub const RC_PERIMETER: u32 = 0x04;
pub const RC_ON: u32 = 0x08;

pub const SMOKE: u32 = 0x000D_7797;
pub const ROOM1_PIR: u32 = 0x0004_D1D0;
pub const PIR_MOTION: u32 = 0x09;

pub const DOOR_PIN: u32 = 18;
pub const HALLWAY_PIN: u32 = 19;

pub const STATUS_TOPIC: &str = "home/security/status";
pub const MODE_TOPIC: &str = "home/config/security/mode";

pub struct Panel {
    pub service: AlarmService,
    pub queue: SignalQueue,
    pub io: MockIo,
}

#[allow(dead_code)]
impl Panel {
    pub fn new() -> Self {
        Self::with_config(AlarmConfig::default())
    }

    pub fn with_config(config: AlarmConfig) -> Self {
        Self::boot(config, MockIo::new())
    }

    /// Start a fresh service on top of `io`, restoring whatever it stores.
    pub fn boot(config: AlarmConfig, io: MockIo) -> Self {
        Self::with_registry(default_layout().build(), config, io)
    }

    pub fn with_registry(registry: Registry, config: AlarmConfig, mut io: MockIo) -> Self {
        let mut service = AlarmService::new(registry, config);
        service.start(0, &mut io);
        Self {
            service,
            queue: SignalQueue::new(),
            io,
        }
    }

    /// Power-cycle: keep storage, rebuild everything else.
    pub fn reboot(self) -> Self {
        let config = self.service.config().clone();
        Self::boot(config, self.io.rebooted())
    }

    pub fn input(&mut self, kind: SensorKind, address: u32, code: u32, at_ms: u32) -> usize {
        self.queue
            .post(Signal::Input(InputSignal {
                kind,
                address,
                code,
                at_ms,
            }))
            .expect("queue accepts input");
        self.tick(at_ms)
    }

    pub fn wired(&mut self, pin: u32, code: u32, at_ms: u32) -> usize {
        self.input(SensorKind::WiredDigital, pin, code, at_ms)
    }

    pub fn rf(&mut self, address: u32, code: u32, at_ms: u32) -> usize {
        self.input(SensorKind::Wireless433, address, code, at_ms)
    }

    pub fn external(&mut self, address: u32, code: u32, at_ms: u32) -> usize {
        self.input(SensorKind::External, address, code, at_ms)
    }

    /// Press a remote button twice, 200 ms apart: enough for its threshold.
    pub fn press(&mut self, code: u32, at_ms: u32) {
        self.rf(RC, code, at_ms);
        self.rf(RC, code, at_ms + 200);
    }

    pub fn admin(&mut self, command: AdminCommand, at_ms: u32) -> usize {
        self.queue
            .post(Signal::Admin { command, at_ms })
            .expect("queue accepts admin command");
        self.tick(at_ms)
    }

    /// One worker iteration at `now_ms`.
    pub fn tick(&mut self, now_ms: u32) -> usize {
        self.service.run_once(&self.queue, now_ms, &mut self.io)
    }

    pub fn arm(&mut self, at_ms: u32) {
        self.press(RC_ON, at_ms);
        assert_eq!(self.service.mode(), Mode::Armed);
    }

    /// Event bound to `slot` of the sensor published under `topic`.
    pub fn event(&self, topic: &str, slot: u8) -> EventId {
        let registry = self.service.registry();
        let sensor = registry.sensor_by_topic(topic).expect("sensor in layout");
        registry.slot(sensor, slot).expect("slot in layout")
    }

    pub fn phase(&self, topic: &str, slot: u8) -> EventPhase {
        self.service.phase(self.event(topic, slot))
    }
}
