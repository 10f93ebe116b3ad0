//! Siren, strobe, buzzer, armed LED and zone relays.
//!
//! All outputs are plain active-HIGH GPIOs.  The buzzer on the main board
//! follows the siren so a disconnected external horn is still audible
//! indoors.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real GPIO pins via hw_init.
//! On host/test: hw_init keeps the levels in its pin simulation.

use log::{info, warn};

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SirenState {
    Silent,
    Sounding,
}

pub struct AnnunciatorDriver {
    siren: SirenState,
    strobe: bool,
    armed_led: bool,
    relays: [bool; pins::RELAY_GPIOS.len()],
}

impl Default for AnnunciatorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnunciatorDriver {
    pub fn new() -> Self {
        Self {
            siren: SirenState::Silent,
            strobe: false,
            armed_led: false,
            relays: [false; pins::RELAY_GPIOS.len()],
        }
    }

    pub fn sound(&mut self) {
        hw_init::gpio_write(pins::SIREN_GPIO, true);
        hw_init::gpio_write(pins::BUZZER_GPIO, true);
        if self.siren == SirenState::Silent {
            info!("Siren: ON");
        }
        self.siren = SirenState::Sounding;
    }

    pub fn silence(&mut self) {
        hw_init::gpio_write(pins::SIREN_GPIO, false);
        hw_init::gpio_write(pins::BUZZER_GPIO, false);
        if self.siren == SirenState::Sounding {
            info!("Siren: OFF");
        }
        self.siren = SirenState::Silent;
    }

    pub fn set_strobe(&mut self, on: bool) {
        hw_init::gpio_write(pins::FLASHER_GPIO, on);
        self.strobe = on;
    }

    pub fn set_armed_led(&mut self, on: bool) {
        hw_init::gpio_write(pins::ALARM_LED_GPIO, on);
        self.armed_led = on;
    }

    /// Switch relay `index`.  Indices without a wired channel are ignored.
    pub fn set_relay(&mut self, index: u8, on: bool) {
        let Some(&gpio) = pins::RELAY_GPIOS.get(usize::from(index)) else {
            warn!("Relay {} not wired, ignoring", index);
            return;
        };
        hw_init::gpio_write(gpio, on);
        self.relays[usize::from(index)] = on;
    }

    /// Everything off; the armed LED is left alone.
    pub fn all_off(&mut self) {
        self.silence();
        self.set_strobe(false);
        for index in 0..self.relays.len() {
            self.set_relay(index as u8, false);
        }
    }

    pub fn siren(&self) -> SirenState {
        self.siren
    }

    pub fn is_sounding(&self) -> bool {
        self.siren == SirenState::Sounding
    }

    pub fn strobe(&self) -> bool {
        self.strobe
    }

    pub fn armed_led(&self) -> bool {
        self.armed_led
    }

    pub fn relay(&self, index: u8) -> bool {
        self.relays.get(usize::from(index)).copied().unwrap_or(false)
    }
}
