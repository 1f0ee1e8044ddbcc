//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (GPIO, store, transports, event sinks) implement these
//! traits.  The [`Controller`](super::service::Controller) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! All port errors are typed; callers log them and carry on.

use crate::config::{ChannelKind, DoorConfig};
use crate::error::{ActuatorError, NotifyError, SensorError, StorageError};
use crate::notify::OutboundMessage;

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait SensorPort {
    /// Raw value of the door's position switch, compared by the caller
    /// with [`DoorConfig::closed_sense_value`].
    fn read_sense(&mut self, door: &DoorConfig) -> Result<u8, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorPort {
    /// Drive the relay low, hold, restore high.  Blocks for the hold time.
    fn pulse_relay(&mut self, door: &DoorConfig) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Last-open store (driven adapter: domain ↔ disk)
// ───────────────────────────────────────────────────────────────

/// Persistent `door id → last completed close` table.
///
/// Writes MUST be atomic: no partial table on power loss.
pub trait LastOpenStore {
    /// Stored value, or `Ok(None)` if the door has never been recorded.
    fn get_last_open_time(&self, door_id: &str) -> Result<Option<f64>, StorageError>;

    fn set_last_open_time(&mut self, door_id: &str, at: f64) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Notification transport (driven adapter: worker → remote service)
// ───────────────────────────────────────────────────────────────

/// One delivery channel (email, push).  Runs on the notify worker, never
/// on the tick thread.
#[allow(async_fn_in_trait)]
pub trait NotifyTransport {
    fn kind(&self) -> ChannelKind;

    async fn send(&mut self, msg: &OutboundMessage) -> Result<(), NotifyError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / history)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    /// Wall-clock epoch seconds.
    fn now(&self) -> f64;
}
