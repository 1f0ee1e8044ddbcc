//! GPIO adapter: bridges `embedded-hal` pins to the domain port traits.
//!
//! Generic over the pin and delay types so the same adapter drives real
//! lines or the [`sim`](super::sim) pins used in debug mode.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::DoorConfig;
use crate::error::{ActuatorError, SensorError};

/// The two lines wired to one door.
pub struct DoorPins<I, O> {
    pub door_id: String,
    /// Position switch; high reads as 1.
    pub sense: I,
    /// Opener relay, active low.
    pub relay: O,
}

pub struct GpioHardware<I, O, D> {
    doors: Vec<DoorPins<I, O>>,
    delay: D,
    hold_ms: u32,
}

impl<I, O, D> GpioHardware<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    /// Relays are driven high (idle) on construction.
    pub fn new(mut doors: Vec<DoorPins<I, O>>, delay: D, hold_ms: u32) -> Self {
        for pins in &mut doors {
            if pins.relay.set_high().is_err() {
                log::warn!("{}: could not idle relay line", pins.door_id);
            }
        }
        Self {
            doors,
            delay,
            hold_ms,
        }
    }

    fn pins_mut(&mut self, door_id: &str) -> Option<&mut DoorPins<I, O>> {
        self.doors.iter_mut().find(|p| p.door_id == door_id)
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I, O, D> SensorPort for GpioHardware<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    fn read_sense(&mut self, door: &DoorConfig) -> Result<u8, SensorError> {
        let pins = self.pins_mut(&door.id).ok_or(SensorError::NotBound)?;
        let high = pins
            .sense
            .is_high()
            .map_err(|_| SensorError::GpioReadFailed)?;
        Ok(u8::from(high))
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<I, O, D> ActuatorPort for GpioHardware<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    fn pulse_relay(&mut self, door: &DoorConfig) -> Result<(), ActuatorError> {
        let hold_ms = self.hold_ms;
        let idx = self
            .doors
            .iter()
            .position(|p| p.door_id == door.id)
            .ok_or(ActuatorError::NotBound)?;

        debug!("{}: relay pulse {hold_ms} ms", door.name);
        self.doors[idx]
            .relay
            .set_low()
            .map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.delay.delay_ms(hold_ms);
        self.doors[idx]
            .relay
            .set_high()
            .map_err(|_| ActuatorError::GpioWriteFailed)
    }
}
