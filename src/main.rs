//! HomeAlarm firmware entry point
//!
//! Hexagonal architecture with a single queue-fed engine worker.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (OutputPort)      LogNotifier    (Config +    (engine clock)  │
//! │                    LogPublisher    Storage)                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            AlarmService (pure logic)                   │    │
//! │  │  matcher · gates · dispatcher · mode · timers          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Sources: wired debouncers · RX433 decoder  ──▶ INPUT_QUEUE    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use homealarm::adapters::device::DeviceIo;
use homealarm::adapters::hardware::{HardwareAdapter, HwInputPin};
use homealarm::adapters::nvs::NvsAdapter;
use homealarm::adapters::time::Esp32TimeAdapter;
use homealarm::app::ports::ConfigPort;
use homealarm::app::service::AlarmService;
use homealarm::config::AlarmConfig;
use homealarm::drivers::annunciator::AnnunciatorDriver;
use homealarm::drivers::{hw_init, watchdog::Watchdog};
use homealarm::events::{INPUT_QUEUE, Signal};
use homealarm::layout;
use homealarm::sources::rx433::{FrameLayout, Rx433Receiver};
use homealarm::sources::wired::{self, WiredInput};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HomeAlarm v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware peripherals ───────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without outputs the panel cannot alarm.
        log::error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    let isr_installed = match hw_init::init_isr_service() {
        Ok(()) => true,
        Err(e) => {
            log::error!("ISR service init failed: {}, polling wired inputs every tick", e);
            false
        }
    };

    // ── 3. Config from NVS (or defaults) ──────────────────────
    let nvs = NvsAdapter::new().unwrap_or_else(|e| {
        warn!("NVS init failed ({}), running without persistence", e);
        NvsAdapter::default()
    });
    let config = nvs.load().unwrap_or_else(|e| {
        warn!("NVS config load failed ({}), using defaults", e);
        AlarmConfig::default()
    });

    // ── 4. Registry and sources ───────────────────────────────
    let registry = layout::default_layout().build();
    info!(
        "Layout: {} zones, {} sensors, {} events",
        registry.zone_count(),
        registry.sensor_count(),
        registry.event_count()
    );

    let mut wired_inputs: Vec<WiredInput<HwInputPin>> = registry
        .wired_sensors()
        .map(|s| {
            WiredInput::new(
                HwInputPin::new(s.address as i32),
                s.address,
                config.wired_alarm_level_high,
                config.wired_debounce_ms,
            )
        })
        .collect();
    let mut rx433 = Rx433Receiver::new(FrameLayout::Addr20Cmd4, config.rx433_repeat_guard_ms);

    // ── 5. Adapters and engine ────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut io = DeviceIo::new(HardwareAdapter::new(AnnunciatorDriver::new()), nvs);
    let tick = std::time::Duration::from_millis(u64::from(config.tick_interval_ms));
    let mut engine = AlarmService::new(registry, config);
    engine.start(clock.now_ms(), &mut io);

    let watchdog = Watchdog::default();
    info!("System ready. Entering worker loop.");

    // ── 6. Worker loop ────────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        // Wired zones.  Full-queue drops are counted by the queue and
        // reported by the worker.
        wired::poll_inputs(&mut wired_inputs, isr_installed, now_ms, |signal| {
            let _ = INPUT_QUEUE.post(Signal::Input(signal));
        });

        // 433 MHz: decode everything the ISR captured.
        rx433.drain(now_ms, |signal| {
            let _ = INPUT_QUEUE.post(Signal::Input(signal));
        });

        engine.run_once(&INPUT_QUEUE, now_ms, &mut io);

        watchdog.feed();
        std::thread::sleep(tick);
    }
}
