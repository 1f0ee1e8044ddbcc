//! Function-pointer door state machine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  StateTable                                             │
//! │  ┌─────────┬──────────┬──────────┬───────────────────┐  │
//! │  │ State   │ on_enter │ on_exit  │ on_update         │  │
//! │  ├─────────┼──────────┼──────────┼───────────────────┤  │
//! │  │ Closed  │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ Opening │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ Open    │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ Closing │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  └─────────┴──────────┴──────────┴───────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current state.  If it
//! returns `Some(next)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next.  When `next` is a dwell state (OPENING or
//! CLOSING) its `on_update` runs once more in the same tick, so a zero
//! dwell resolves on the tick that saw the edge.

pub mod context;
pub mod states;

use core::fmt;

use context::DoorContext;
use log::info;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Logical door state.  Only CLOSED → OPENING → OPEN → CLOSING → CLOSED
/// transitions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DoorState {
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl DoorState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert a table index back to `DoorState`.  Out-of-range indices
    /// assert in debug builds and fall back to `Closed`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Closed,
            1 => Self::Opening,
            2 => Self::Open,
            3 => Self::Closing,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Closed
            }
        }
    }

    /// Wire name, as used in update records and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }

    /// OPENING and CLOSING: the door is moving and manual clicks are refused.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// The only state reachable from `self`.
    pub fn successor(self) -> Self {
        match self {
            Self::Closed => Self::Opening,
            Self::Opening => Self::Open,
            Self::Open => Self::Closing,
            Self::Closing => Self::Closed,
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut DoorContext);

/// Per-tick update handler.  Returns `Some(next)` to transition.
pub type StateUpdateFn = fn(&mut DoorContext) -> Option<DoorState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: DoorState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `DoorState as usize`.
    table: [StateDescriptor; DoorState::COUNT],
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
}

impl Fsm {
    /// Construct a machine sitting in `initial`.  No `on_enter` runs: the
    /// caller seeds the context for the startup state itself.
    pub fn new(table: [StateDescriptor; DoorState::COUNT], initial: DoorState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
        }
    }

    /// Advance by one tick.
    ///
    /// Returns the transitions taken, oldest first (at most two: an edge
    /// into a dwell state followed by that dwell state resolving).
    pub fn tick(&mut self, ctx: &mut DoorContext) -> heapless::Vec<DoorState, 2> {
        self.tick_count += 1;
        let mut taken = heapless::Vec::new();

        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
            let _ = taken.push(next);

            if next.is_transitional() {
                if let Some(after) = (self.table[self.current].on_update)(ctx) {
                    self.transition(after, ctx);
                    let _ = taken.push(after);
                }
            }
        }
        taken
    }

    /// Jump to `next` regardless of `on_update`, running exit/enter.
    pub fn force_transition(&mut self, next: DoorState, ctx: &mut DoorContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> DoorState {
        DoorState::from_index(self.current)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: DoorState, ctx: &mut DoorContext) {
        let next_idx = next as usize;

        info!(
            "{}: {} -> {}",
            ctx.name, self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
