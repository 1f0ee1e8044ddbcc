//! Per-door blackboard threaded through every state handler.
//!
//! `DoorContext` holds the latest sensor reading, the six timestamps, the
//! pending flags and the commands the handlers leave for the controller
//! (relay pulse, persistence, notice).  Handlers never touch hardware.

use super::DoorState;
use crate::config::TimingConfig;

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Entry timestamp (epoch seconds) for each logical state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateTimers {
    pub closed: f64,
    pub opening: f64,
    pub open: f64,
    pub closing: f64,
}

impl StateTimers {
    pub fn get(&self, state: DoorState) -> f64 {
        match state {
            DoorState::Closed => self.closed,
            DoorState::Opening => self.opening,
            DoorState::Open => self.open,
            DoorState::Closing => self.closing,
        }
    }

    pub fn set(&mut self, state: DoorState, at: f64) {
        match state {
            DoorState::Closed => self.closed = at,
            DoorState::Opening => self.opening = at,
            DoorState::Open => self.open = at,
            DoorState::Closing => self.closing = at,
        }
    }
}

/// Reminder and auto-close timers; only meaningful while OPEN.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpenTimers {
    pub still_open: f64,
    pub force_close: f64,
}

// ---------------------------------------------------------------------------
// Flags and commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorFlags {
    /// The "is open" notice has not been sent for the current opening.
    pub open_notice: bool,
    /// Debug-level "opened" log line is owed.
    pub open_debug_notice: bool,
    /// An opened event is owed to the event sink.
    pub open_event_publish: bool,
    /// A closed event is owed to the event sink.
    pub close_event_publish: bool,
}

/// Side effects requested by handlers, applied by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DoorCommands {
    pub pulse_relay: bool,
    /// New `time_since_last_open` to write to the store.
    pub persist_last_open: Option<f64>,
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Opened,
    StillOpen,
    ForceClosed,
    Closed,
    Startup,
}

/// Operator-facing message produced by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Timing (seconds, as f64 for direct comparison with elapsed())
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoorTiming {
    pub time_to_open: f64,
    pub time_to_close: f64,
    pub time_to_report_open: f64,
    pub time_to_report_still_open: f64,
    pub time_to_force_close: Option<f64>,
}

impl From<&TimingConfig> for DoorTiming {
    fn from(cfg: &TimingConfig) -> Self {
        Self {
            time_to_open: f64::from(cfg.time_to_open),
            time_to_close: f64::from(cfg.time_to_close),
            time_to_report_open: f64::from(cfg.time_to_report_open),
            time_to_report_still_open: f64::from(cfg.time_to_report_still_open),
            time_to_force_close: cfg.time_to_force_close.map(f64::from),
        }
    }
}

// ---------------------------------------------------------------------------
// DoorContext
// ---------------------------------------------------------------------------

pub struct DoorContext {
    /// Display name used in notice text.
    pub name: String,
    /// Evaluation time for the current tick (epoch seconds).
    pub now: f64,
    /// Logical reading of the sensor this tick; `None` if the read failed.
    pub reading: Option<DoorState>,

    pub timers: StateTimers,
    pub open_timers: OpenTimers,
    /// Completion time of the previous close (persisted across restarts).
    pub time_since_last_open: f64,

    pub flags: DoorFlags,
    pub timing: DoorTiming,

    pub commands: DoorCommands,
    /// Last notice produced this tick; later rules overwrite earlier ones.
    pub notice: Option<Notice>,
}

impl DoorContext {
    pub fn new(name: impl Into<String>, timing: DoorTiming, last_open: f64) -> Self {
        Self {
            name: name.into(),
            now: 0.0,
            reading: None,
            timers: StateTimers::default(),
            open_timers: OpenTimers::default(),
            time_since_last_open: last_open,
            flags: DoorFlags::default(),
            timing,
            commands: DoorCommands::default(),
            notice: None,
        }
    }

    /// Seconds since `t`.
    pub fn elapsed(&self, t: f64) -> f64 {
        self.now - t
    }

    /// Re-arm OPEN and its auxiliary timers, owing a fresh "is open" notice.
    pub fn rearm_open(&mut self) {
        self.timers.open = self.now;
        self.open_timers.still_open = self.now;
        self.open_timers.force_close = self.now;
        self.flags.open_notice = true;
    }

    /// Clear per-tick outputs before evaluation.
    pub fn begin_tick(&mut self, now: f64, reading: Option<DoorState>) {
        self.now = now;
        self.reading = reading;
        self.commands = DoorCommands::default();
        self.notice = None;
    }

    pub fn post_notice(&mut self, kind: NoticeKind, text: String) {
        self.notice = Some(Notice::new(kind, text));
    }
}
