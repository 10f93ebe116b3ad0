//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions for the annunciators, relays and zone inputs
//! and installs the edge ISRs for the wired zones and the 433 MHz receiver,
//! using raw ESP-IDF sys calls.  Called once from `main()` before the
//! worker loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrAddFailed { pin: i32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => {
                write!(f, "GPIO ISR service install failed (rc={})", rc)
            }
            Self::IsrAddFailed { pin, rc } => {
                write!(f, "ISR handler for GPIO {} failed (rc={})", pin, rc)
            }
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

/// Every output pin, driven LOW at boot.
#[cfg(target_os = "espidf")]
fn output_pins() -> impl Iterator<Item = i32> {
    [
        pins::SIREN_GPIO,
        pins::FLASHER_GPIO,
        pins::BUZZER_GPIO,
        pins::ALARM_LED_GPIO,
    ]
    .into_iter()
    .chain(pins::RELAY_GPIOS)
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the worker loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // Zone contacts idle closed to ground; the pull-up makes a cut wire
    // read as an alarm.
    for &pin in &pins::WIRED_ZONE_GPIOS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    // The receiver drives its data line actively.
    let rx_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::RX433_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };
    let ret = unsafe { gpio_config(&rx_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    sim::read(pin)
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for pin in output_pins() {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Worker loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim::write(pin, high);
}

// ── Host pin simulation ───────────────────────────────────────

/// Pin levels on the host, one bit per GPIO.  Outputs written by the
/// drivers read back; tests drive inputs with [`sim::set_level`].
#[cfg(not(target_os = "espidf"))]
pub mod sim {
    use core::sync::atomic::{AtomicU64, Ordering};

    static LEVELS: AtomicU64 = AtomicU64::new(0);

    pub fn set_level(pin: i32, high: bool) {
        write(pin, high);
    }

    pub(super) fn write(pin: i32, high: bool) {
        if !(0..64).contains(&pin) {
            return;
        }
        if high {
            LEVELS.fetch_or(1 << pin, Ordering::AcqRel);
        } else {
            LEVELS.fetch_and(!(1 << pin), Ordering::AcqRel);
        }
    }

    pub fn read(pin: i32) -> bool {
        (0..64).contains(&pin) && LEVELS.load(Ordering::Acquire) & (1 << pin) != 0
    }
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering};

/// Low 32 bits of the previous receiver edge time (microseconds since boot).
#[cfg(target_os = "espidf")]
static RX433_LAST_EDGE_US: AtomicU32 = AtomicU32::new(0);

#[cfg(target_os = "espidf")]
unsafe extern "C" fn wired_zone_isr(arg: *mut core::ffi::c_void) {
    // The GPIO number travels in the argument pointer.
    crate::sources::wired::note_edge_from_isr(arg as usize as u32);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn rx433_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is a RTC counter read; safe in ISR context.
    let now = unsafe { esp_timer_get_time() } as u32;
    let last = RX433_LAST_EDGE_US.swap(now, Ordering::AcqRel);
    crate::sources::rx433::pulse_isr_handler(now.wrapping_sub(last));
}

#[cfg(target_os = "espidf")]
unsafe fn add_handler(
    pin: i32,
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
    arg: *mut core::ffi::c_void,
) -> Result<(), HwInitError> {
    let rc = unsafe { gpio_isr_handler_add(pin, Some(handler), arg) };
    if rc != ESP_OK as i32 {
        return Err(HwInitError::IsrAddFailed { pin, rc });
    }
    unsafe {
        gpio_intr_enable(pin);
    }
    Ok(())
}

/// Install the per-pin GPIO ISR service and register interrupt handlers.
/// Call after init_peripherals() and before the worker loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handlers below only touch
    // lock-free atomics and the pulse queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        for &pin in &pins::WIRED_ZONE_GPIOS {
            add_handler(pin, wired_zone_isr, pin as usize as *mut core::ffi::c_void)?;
        }

        RX433_LAST_EDGE_US.store(esp_timer_get_time() as u32, Ordering::Release);
        add_handler(pins::RX433_GPIO, rx433_isr, core::ptr::null_mut())?;

        info!(
            "hw_init: ISR service installed (wired x{}, rx433)",
            pins::WIRED_ZONE_GPIOS.len()
        );
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
