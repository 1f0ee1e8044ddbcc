//! Outbound application events.
//!
//! The [`Controller`](super::service::Controller) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them or append them to a
//! history table.

use crate::fsm::DoorState;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The controller has started (carries each door's initial state).
    Started(Vec<(String, DoorState)>),

    /// A door's state machine moved.
    StateChanged {
        door_id: String,
        from: DoorState,
        to: DoorState,
    },

    /// A door began opening.
    DoorOpened { door_id: String, at: f64 },

    /// A door finished closing.
    DoorClosed { door_id: String, at: f64 },

    /// A relay pulse was issued (manual click, close-all or force-close).
    RelayPulsed { door_id: String },

    /// Motion re-armed the open timers of these doors.
    Motion { rearmed: Vec<String> },

    /// A door's evaluation panicked; it keeps its previous state.
    EvaluationFailed { door_id: String },
}
