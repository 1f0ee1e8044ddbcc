//! One physical door: its configuration, state machine and context.

use log::debug;

use crate::config::DoorConfig;
use crate::fsm::context::{DoorCommands, DoorContext, DoorTiming, Notice};
use crate::fsm::states::build_state_table;
use crate::fsm::{DoorState, Fsm};

/// Map a raw sense value to a logical reading.
pub fn sense_to_state(raw: u8, closed_value: u8) -> DoorState {
    if raw == closed_value {
        DoorState::Closed
    } else {
        DoorState::Open
    }
}

/// Read-only view of a door for snapshots and the web surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DoorView {
    pub id: String,
    pub name: String,
    pub state: DoorState,
    pub time_in_state: f64,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Transitions taken this tick, oldest first.
    pub transitions: Vec<(DoorState, DoorState)>,
    pub commands: DoorCommands,
    pub notice: Option<Notice>,
    /// An "opened" debug line was owed and has been consumed.
    pub opened_debug: bool,
}

pub struct Door {
    spec: DoorConfig,
    fsm: Fsm,
    ctx: DoorContext,
}

impl Door {
    /// Create a door in the state its sensor reports at startup.
    ///
    /// `initial` is `None` when the startup read failed; the door then
    /// starts CLOSED and the next good read drives the real transition.
    pub fn new(
        spec: DoorConfig,
        timing: DoorTiming,
        initial: Option<DoorState>,
        last_open: f64,
        now: f64,
    ) -> Self {
        let state = initial.unwrap_or(DoorState::Closed);
        let mut ctx = DoorContext::new(spec.name.clone(), timing, last_open);
        ctx.begin_tick(now, initial);
        ctx.timers.set(state, now);
        if state == DoorState::Open {
            ctx.timers.opening = now;
            ctx.rearm_open();
        }
        Self {
            spec,
            fsm: Fsm::new(build_state_table(), state),
            ctx,
        }
    }

    /// Run one tick with this tick's sensor reading.  A failed read
    /// (`None`) leaves the door untouched: no transition, timer, notice or
    /// command until a later read succeeds.
    pub fn evaluate(&mut self, reading: Option<DoorState>, now: f64) -> Evaluation {
        if reading.is_none() {
            return Evaluation::default();
        }
        self.ctx.begin_tick(now, reading);
        let mut prev = self.fsm.current_state();
        let taken = self.fsm.tick(&mut self.ctx);

        let mut transitions = Vec::with_capacity(taken.len());
        for next in taken {
            transitions.push((prev, next));
            prev = next;
        }

        let opened_debug = self.ctx.flags.open_debug_notice;
        if opened_debug {
            self.ctx.flags.open_debug_notice = false;
            debug!("{} opened", self.ctx.name);
        }

        Evaluation {
            transitions,
            commands: self.ctx.commands,
            notice: self.ctx.notice.take(),
            opened_debug,
        }
    }

    /// Motion seen: an OPEN door whose open notice already went out is
    /// re-armed as if it had just opened.  Returns whether it was.
    pub fn on_motion(&mut self, now: f64) -> bool {
        if self.state() != DoorState::Open || self.ctx.flags.open_notice {
            return false;
        }
        self.ctx.now = now;
        self.ctx.rearm_open();
        true
    }

    /// Consume the owed (opened, closed) event flags.
    pub fn take_publish_flags(&mut self) -> (bool, bool) {
        let flags = &mut self.ctx.flags;
        let owed = (flags.open_event_publish, flags.close_event_publish);
        flags.open_event_publish = false;
        flags.close_event_publish = false;
        owed
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &DoorConfig {
        &self.spec
    }

    pub fn state(&self) -> DoorState {
        self.fsm.current_state()
    }

    /// Timestamp at which the current state was (re)armed.
    pub fn time_in_state(&self) -> f64 {
        self.ctx.timers.get(self.state())
    }

    pub fn time_since_last_open(&self) -> f64 {
        self.ctx.time_since_last_open
    }

    pub fn open_notice_pending(&self) -> bool {
        self.ctx.flags.open_notice
    }

    pub fn view(&self) -> DoorView {
        DoorView {
            id: self.spec.id.clone(),
            name: self.spec.name.clone(),
            state: self.state(),
            time_in_state: self.time_in_state(),
        }
    }
}
