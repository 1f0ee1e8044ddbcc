//! Controller: the hexagonal core.
//!
//! [`Controller`] owns every [`Door`] and the notification dispatcher.
//! All I/O flows through port traits passed in at call sites, so the
//! whole controller runs against mock adapters in tests.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │        Controller        │
//! ActuatorPort ◀──│  Doors · Dispatcher      │ ──▶ Outbox (notify thread)
//!                 └──────────────────────────┘
//!                          ▲        │
//!                 LastOpenStore   Snapshot
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};

use chrono::NaiveDateTime;
use log::{error, info, warn};

use crate::config::{ControllerConfig, DoorConfig};
use crate::door::{Door, DoorView, sense_to_state};
use crate::error::Error;
use crate::fsm::DoorState;
use crate::fsm::context::{DoorTiming, Notice, NoticeKind};
use crate::notify::NotificationDispatcher;
use crate::stream::{Snapshot, UpdateRecord};
use crate::timekeeper::epoch_to_local;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink, LastOpenStore, SensorPort};

// ───────────────────────────────────────────────────────────────
// Close-all wording (shared with the web surface)
// ───────────────────────────────────────────────────────────────

/// Text describing what a close-all would do, or `None` if every door is
/// already closed.
pub fn close_all_summary(doors: &[DoorView]) -> Option<String> {
    let closing: Vec<&str> = doors
        .iter()
        .filter(|d| d.state == DoorState::Open)
        .map(|d| d.name.as_str())
        .collect();
    let busy: Vec<&str> = doors
        .iter()
        .filter(|d| d.state.is_transitional())
        .map(|d| d.name.as_str())
        .collect();

    let mut parts = Vec::new();
    if !closing.is_empty() {
        parts.push(format!("Close All: {}", closing.join(", ")));
    }
    if !busy.is_empty() {
        parts.push(format!("{} Closing or Opening", busy.join(", ")));
    }
    (!parts.is_empty()).then(|| parts.join("; "))
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller {
    doors: Vec<Door>,
    dispatcher: NotificationDispatcher,
    generation: u64,
    tick_count: u64,
    /// A command changed a time-in-state outside a tick.
    touched: bool,
}

impl Controller {
    /// Build every door from its startup sensor read and the stored
    /// last-open time.  A failed read starts the door CLOSED; a missing or
    /// unreadable last-open time falls back to `now` (and is stored back).
    pub fn new(
        config: &ControllerConfig,
        dispatcher: NotificationDispatcher,
        hw: &mut impl SensorPort,
        store: &mut impl LastOpenStore,
        now: f64,
    ) -> Self {
        let timing = DoorTiming::from(&config.timing);
        let doors = config
            .doors
            .iter()
            .map(|spec| {
                let initial = read_state(hw, spec);
                let last_open = load_last_open(store, &spec.id, now);
                Door::new(spec.clone(), timing, initial, last_open, now)
            })
            .collect();

        Self {
            doors,
            dispatcher,
            generation: 0,
            tick_count: 0,
            touched: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// `Initial state of Left:closed, Right:open`
    pub fn startup_message(&self) -> String {
        let states: Vec<String> = self
            .doors
            .iter()
            .map(|d| format!("{}:{}", d.name(), d.state()))
            .collect();
        format!("Initial state of {}", states.join(", "))
    }

    /// Announce startup: emit [`AppEvent::Started`] and send the startup notice.
    pub fn start(&mut self, sink: &mut impl EventSink, now: f64) {
        let msg = self.startup_message();
        info!("{msg}");
        sink.emit(&AppEvent::Started(
            self.doors
                .iter()
                .map(|d| (d.id().to_string(), d.state()))
                .collect(),
        ));
        let local = epoch_to_local(now).unwrap_or_default();
        self.dispatcher
            .dispatch(&Notice::new(NoticeKind::Startup, msg), local);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one pass over every door: read sensor → evaluate → apply
    /// commands → dispatch notice → emit events.  Returns the end-of-tick
    /// snapshot.
    ///
    /// `hw` satisfies both [`SensorPort`] and [`ActuatorPort`], which
    /// avoids a double mutable borrow while keeping the port boundary
    /// explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        store: &mut impl LastOpenStore,
        sink: &mut impl EventSink,
        now: f64,
    ) -> Snapshot {
        self.tick_count += 1;
        let local = epoch_to_local(now).unwrap_or_default();
        let mut changed = core::mem::take(&mut self.touched);

        for door in &mut self.doors {
            let dispatcher = &self.dispatcher;
            let pass = catch_unwind(AssertUnwindSafe(|| {
                tick_door(&mut *door, dispatcher, &mut *hw, &mut *store, &mut *sink, now, local)
            }));
            match pass {
                Ok(moved) => changed |= moved,
                Err(_) => {
                    error!("{}: evaluation panicked, state held", door.name());
                    sink.emit(&AppEvent::EvaluationFailed {
                        door_id: door.id().to_string(),
                    });
                }
            }
        }

        if changed {
            self.generation += 1;
        }
        self.snapshot(now)
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        now: f64,
    ) {
        match cmd {
            AppCommand::Click(id) => {
                let Some(door) = self.doors.iter().find(|d| d.id() == id) else {
                    warn!("click for unknown door {id:?}");
                    return;
                };
                if door.state().is_transitional() {
                    info!("{}: click ignored while {}", door.name(), door.state());
                    return;
                }
                pulse(hw, door.spec(), sink);
            }
            AppCommand::CloseAll => {
                let views = self.views();
                if let Some(summary) = close_all_summary(&views) {
                    info!("{summary}");
                }
                for door in self.doors.iter().filter(|d| d.state() == DoorState::Open) {
                    pulse(hw, door.spec(), sink);
                }
            }
            AppCommand::Motion => {
                let rearmed: Vec<String> = self
                    .doors
                    .iter_mut()
                    .filter_map(|d| d.on_motion(now).then(|| d.id().to_string()))
                    .collect();
                for id in &rearmed {
                    info!("motion detected, reset {id} open timers");
                }
                self.touched |= !rearmed.is_empty();
                sink.emit(&AppEvent::Motion { rearmed });
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self, now: f64) -> Snapshot {
        Snapshot {
            generation: self.generation,
            taken_at: now,
            doors: self.views(),
        }
    }

    /// Records for every door whose time-in-state is at least `watermark`.
    pub fn get_updates(&self, watermark: f64) -> Vec<UpdateRecord> {
        self.snapshot(0.0).updates_since(watermark)
    }

    pub fn views(&self) -> Vec<DoorView> {
        self.doors.iter().map(Door::view).collect()
    }

    pub fn door(&self, id: &str) -> Option<&Door> {
        self.doors.iter().find(|d| d.id() == id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

// ───────────────────────────────────────────────────────────────
// Port helpers
// ───────────────────────────────────────────────────────────────

/// One door's share of a tick.  Returns whether its time-in-state moved.
fn tick_door(
    door: &mut Door,
    dispatcher: &NotificationDispatcher,
    hw: &mut (impl SensorPort + ActuatorPort),
    store: &mut impl LastOpenStore,
    sink: &mut impl EventSink,
    now: f64,
    local: NaiveDateTime,
) -> bool {
    let reading = read_state(hw, door.spec());
    let before = door.time_in_state();
    let eval = door.evaluate(reading, now);

    for (from, to) in &eval.transitions {
        sink.emit(&AppEvent::StateChanged {
            door_id: door.id().to_string(),
            from: *from,
            to: *to,
        });
    }

    if eval.commands.pulse_relay {
        pulse(hw, door.spec(), sink);
    }
    if let Some(at) = eval.commands.persist_last_open {
        if let Err(e) = store.set_last_open_time(door.id(), at) {
            warn!("{}: persisting last-open time: {}", door.name(), Error::from(e));
        }
    }

    let (opened, closed) = door.take_publish_flags();
    if opened {
        sink.emit(&AppEvent::DoorOpened {
            door_id: door.id().to_string(),
            at: now,
        });
    }
    if closed {
        sink.emit(&AppEvent::DoorClosed {
            door_id: door.id().to_string(),
            at: now,
        });
    }

    if let Some(notice) = &eval.notice {
        info!("{}", notice.text);
        dispatcher.dispatch(notice, local);
    }

    door.time_in_state() != before
}

fn read_state(hw: &mut impl SensorPort, spec: &DoorConfig) -> Option<DoorState> {
    match hw.read_sense(spec) {
        Ok(raw) => Some(sense_to_state(raw, spec.closed_sense_value)),
        Err(e) => {
            warn!("{}: {}", spec.name, Error::from(e));
            None
        }
    }
}

fn pulse(hw: &mut impl ActuatorPort, spec: &DoorConfig, sink: &mut impl EventSink) {
    match hw.pulse_relay(spec) {
        Ok(()) => sink.emit(&AppEvent::RelayPulsed {
            door_id: spec.id.clone(),
        }),
        Err(e) => warn!("{}: {}", spec.name, Error::from(e)),
    }
}

fn load_last_open(store: &mut impl LastOpenStore, door_id: &str, now: f64) -> f64 {
    match store.get_last_open_time(door_id) {
        Ok(Some(at)) => at,
        Ok(None) => {
            if let Err(e) = store.set_last_open_time(door_id, now) {
                warn!("{door_id}: storing initial last-open time failed: {e}");
            }
            now
        }
        Err(e) => {
            warn!("{door_id}: reading last-open time failed: {e}");
            now
        }
    }
}
