//! Simulated GPIO for debug mode.
//!
//! Each door gets a shared level: the sense pin reads it and the relay
//! pin flips it on every falling edge, so a click moves the simulated
//! door the way a real opener would.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use super::hardware::DoorPins;

#[derive(Clone)]
pub struct SimSense {
    level: Arc<AtomicBool>,
}

pub struct SimRelay {
    level: Arc<AtomicBool>,
    driven_low: bool,
}

impl ErrorType for SimSense {
    type Error = core::convert::Infallible;
}

impl InputPin for SimSense {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.load(Ordering::Relaxed))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.load(Ordering::Relaxed))
    }
}

impl ErrorType for SimRelay {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimRelay {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if !self.driven_low {
            self.level.fetch_xor(true, Ordering::Relaxed);
        }
        self.driven_low = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.driven_low = false;
        Ok(())
    }
}

/// Thread-sleep delay.
pub struct SimDelay;

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(core::time::Duration::from_nanos(u64::from(ns)));
    }
}

/// Pins for one simulated door whose sensor starts at `initial` (0 or 1).
pub fn sim_door(door_id: &str, initial: u8) -> DoorPins<SimSense, SimRelay> {
    let level = Arc::new(AtomicBool::new(initial != 0));
    DoorPins {
        door_id: door_id.to_string(),
        sense: SimSense {
            level: level.clone(),
        },
        relay: SimRelay {
            level,
            driven_low: false,
        },
    }
}
