//! Mock adapters for integration tests.
//!
//! Records every relay pulse and event so tests can assert on the full
//! history without touching real GPIO lines.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use doorwatch::adapters::store::MemoryStore;
use doorwatch::app::events::AppEvent;
use doorwatch::app::ports::{ActuatorPort, Clock, EventSink, LastOpenStore, SensorPort};
use doorwatch::config::{ControllerConfig, DoorConfig};
use doorwatch::error::{ActuatorError, SensorError, StorageError};

/// 2023-11-14 12:07:00 UTC.  Every timezone sees this well clear of the
/// 03:58-04:05 quiet window for the first few minutes after it.
pub const T0: f64 = 1_699_963_620.0;

/// Raw value the test doors report when closed.
pub const CLOSED: u8 = 0;
pub const OPEN: u8 = 1;

// ── MockHw ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockHw {
    raw: HashMap<String, u8>,
    failing: HashSet<String>,
    stuck_relays: HashSet<String>,
    panicking: HashSet<String>,
    pub pulses: Vec<String>,
}

#[allow(dead_code)]
impl MockHw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, door_id: &str, raw: u8) {
        self.raw.insert(door_id.to_string(), raw);
    }

    pub fn fail_reads(&mut self, door_id: &str, failing: bool) {
        if failing {
            self.failing.insert(door_id.to_string());
        } else {
            self.failing.remove(door_id);
        }
    }

    /// Relay writes for `door_id` fail; no pulse is recorded.
    pub fn fail_pulses(&mut self, door_id: &str) {
        self.stuck_relays.insert(door_id.to_string());
    }

    /// Reading `door_id` panics, as a broken driver would.
    pub fn panic_on_read(&mut self, door_id: &str, panics: bool) {
        if panics {
            self.panicking.insert(door_id.to_string());
        } else {
            self.panicking.remove(door_id);
        }
    }

    pub fn pulses_for(&self, door_id: &str) -> usize {
        self.pulses.iter().filter(|id| *id == door_id).count()
    }
}

impl SensorPort for MockHw {
    fn read_sense(&mut self, door: &DoorConfig) -> Result<u8, SensorError> {
        if self.panicking.contains(&door.id) {
            panic!("sense line for {} wedged", door.id);
        }
        if self.failing.contains(&door.id) {
            return Err(SensorError::GpioReadFailed);
        }
        Ok(self.raw.get(&door.id).copied().unwrap_or(door.closed_sense_value))
    }
}

impl ActuatorPort for MockHw {
    fn pulse_relay(&mut self, door: &DoorConfig) -> Result<(), ActuatorError> {
        if self.stuck_relays.contains(&door.id) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.pulses.push(door.id.clone());
        Ok(())
    }
}

// ── FlakyStore ───────────────────────────────────────────────

/// Last-open store whose reads and writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub rejected_writes: usize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LastOpenStore for FlakyStore {
    fn get_last_open_time(&self, door_id: &str) -> Result<Option<f64>, StorageError> {
        if self.fail_reads {
            return Err(StorageError::Corrupted);
        }
        self.inner.get_last_open_time(door_id)
    }

    fn set_last_open_time(&mut self, door_id: &str, at: f64) -> Result<(), StorageError> {
        if self.fail_writes {
            self.rejected_writes += 1;
            return Err(StorageError::IoError);
        }
        self.inner.set_last_open_time(door_id, at)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self, door_id: &str) -> Vec<(doorwatch::fsm::DoorState, doorwatch::fsm::DoorState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { door_id: id, from, to } if id == door_id => {
                    Some((*from, *to))
                }
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// Shared settable clock; clones see the same time.
#[derive(Clone)]
pub struct MockClock {
    bits: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(t: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(t.to_bits())),
        }
    }

    pub fn set(&self, t: f64) {
        self.bits.store(t.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for MockClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

// ── Config ────────────────────────────────────────────────────

/// Two doors, short dwell and report times, alerts on with a push channel.
pub fn two_door_config() -> ControllerConfig {
    ControllerConfig::from_json_str(
        r#"{
            "timing": {
                "time_to_open": 10,
                "time_to_close": 10,
                "time_to_report_open": 30,
                "time_to_report_still_open": 120
            },
            "alerts": { "channel": "push" },
            "doors": [
                { "id": "left",  "name": "Left",  "relay_pin": 23, "state_pin": 17, "closed_sense_value": 0 },
                { "id": "right", "name": "Right", "relay_pin": 24, "state_pin": 27, "closed_sense_value": 0 }
            ]
        }"#,
    )
    .unwrap()
}
