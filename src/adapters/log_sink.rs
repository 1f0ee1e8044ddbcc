//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the log.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(doors) => {
                let states: Vec<String> =
                    doors.iter().map(|(id, s)| format!("{id}={s}")).collect();
                info!("START | {}", states.join(" "));
            }
            AppEvent::StateChanged { door_id, from, to } => {
                info!("STATE | {door_id} | {from} -> {to}");
            }
            AppEvent::DoorOpened { door_id, at } => {
                info!("EVENT | {door_id} | opened at {at:.0}");
            }
            AppEvent::DoorClosed { door_id, at } => {
                info!("EVENT | {door_id} | closed at {at:.0}");
            }
            AppEvent::RelayPulsed { door_id } => {
                info!("RELAY | {door_id} | pulsed");
            }
            AppEvent::Motion { rearmed } => {
                info!("MOTION | rearmed [{}]", rearmed.join(", "));
            }
            AppEvent::EvaluationFailed { door_id } => {
                info!("FAULT | {door_id} | evaluation failed");
            }
        }
    }
}
