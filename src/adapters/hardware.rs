//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`AnnunciatorDriver`] and exposes it through [`OutputPort`].
//! Wired zone pins are handed to the input sources as [`HwInputPin`]s,
//! which implement `embedded_hal::digital::InputPin` over hw_init.  On
//! non-espidf targets the underlying calls hit the pin simulation.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};

use crate::app::ports::OutputPort;
use crate::drivers::annunciator::AnnunciatorDriver;
use crate::drivers::hw_init;

/// Concrete adapter that puts all outputs behind [`OutputPort`].
pub struct HardwareAdapter {
    annunciator: AnnunciatorDriver,
}

impl HardwareAdapter {
    pub fn new(annunciator: AnnunciatorDriver) -> Self {
        Self { annunciator }
    }

    pub fn annunciator(&self) -> &AnnunciatorDriver {
        &self.annunciator
    }
}

// ── OutputPort implementation ─────────────────────────────────

impl OutputPort for HardwareAdapter {
    fn set_siren(&mut self, on: bool) {
        if on {
            self.annunciator.sound();
        } else {
            self.annunciator.silence();
        }
    }

    fn set_strobe(&mut self, on: bool) {
        self.annunciator.set_strobe(on);
    }

    fn set_relay(&mut self, relay: u8, on: bool) {
        self.annunciator.set_relay(relay, on);
    }

    fn set_armed_led(&mut self, on: bool) {
        self.annunciator.set_armed_led(on);
    }

    fn all_off(&mut self) {
        self.annunciator.all_off();
    }
}

// ── Wired input pins ──────────────────────────────────────────

/// A configured GPIO input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwInputPin {
    gpio: i32,
}

impl HwInputPin {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl ErrorType for HwInputPin {
    type Error = Infallible;
}

impl InputPin for HwInputPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(hw_init::gpio_read(self.gpio))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!hw_init::gpio_read(self.gpio))
    }
}
