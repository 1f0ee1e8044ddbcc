//! Concrete state handlers and the table builder.
//!
//! ```text
//!  CLOSED ──[sensor open]──▶ OPENING ──[time_to_open]──▶ OPEN
//!    ▲                                                     │
//!    │                                            [sensor closed]
//!    │                                                     ▼
//!    └───────────────[time_to_close]─────────────────── CLOSING
//!
//!  OPEN, every tick: "is open" after time_to_report_open,
//!                    "is still open" every time_to_report_still_open,
//!                    force-close after time_to_force_close (if enabled)
//! ```

use super::context::{DoorContext, NoticeKind};
use super::{DoorState, StateDescriptor};
use crate::timekeeper::{STILL_OPEN_ALIGN_MINS, format_span, round_up_epoch};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; DoorState::COUNT] {
    [
        // Index 0: Closed
        StateDescriptor {
            id: DoorState::Closed,
            name: "Closed",
            on_enter: Some(closed_enter),
            on_exit: None,
            on_update: closed_update,
        },
        // Index 1: Opening
        StateDescriptor {
            id: DoorState::Opening,
            name: "Opening",
            on_enter: Some(opening_enter),
            on_exit: None,
            on_update: opening_update,
        },
        // Index 2: Open
        StateDescriptor {
            id: DoorState::Open,
            name: "Open",
            on_enter: Some(open_enter),
            on_exit: None,
            on_update: open_update,
        },
        // Index 3: Closing
        StateDescriptor {
            id: DoorState::Closing,
            name: "Closing",
            on_enter: Some(closing_enter),
            on_exit: None,
            on_update: closing_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSED
// ═══════════════════════════════════════════════════════════════════════════

fn closed_enter(ctx: &mut DoorContext) {
    let now = ctx.now;
    ctx.timers.closed = now;

    let open_for = format_span(ctx.elapsed(ctx.timers.opening));
    let away = format_span(ctx.elapsed(ctx.time_since_last_open));
    let text = if ctx.flags.open_notice {
        format!(
            "{} was opened and closed after {open_for} (previous open {away} ago)",
            ctx.name
        )
    } else {
        format!(
            "{} was closed after {open_for} (previous open {away} ago)",
            ctx.name
        )
    };

    ctx.time_since_last_open = now;
    ctx.commands.persist_last_open = Some(now);
    ctx.flags.open_notice = false;
    ctx.flags.open_debug_notice = false;
    ctx.flags.close_event_publish = true;
    ctx.post_notice(NoticeKind::Closed, text);
}

fn closed_update(ctx: &mut DoorContext) -> Option<DoorState> {
    (ctx.reading == Some(DoorState::Open)).then_some(DoorState::Opening)
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPENING
// ═══════════════════════════════════════════════════════════════════════════

fn opening_enter(ctx: &mut DoorContext) {
    ctx.timers.opening = ctx.now;
    ctx.flags.open_event_publish = true;
}

/// Without a reading the dwell does not complete; the door holds.
fn opening_update(ctx: &mut DoorContext) -> Option<DoorState> {
    ctx.reading?;
    (ctx.elapsed(ctx.timers.opening) >= ctx.timing.time_to_open).then_some(DoorState::Open)
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPEN
// ═══════════════════════════════════════════════════════════════════════════

fn open_enter(ctx: &mut DoorContext) {
    ctx.rearm_open();
    ctx.flags.open_debug_notice = true;
}

fn open_update(ctx: &mut DoorContext) -> Option<DoorState> {
    // Closing edge first: no reminder on the tick the door is seen moving.
    if ctx.reading == Some(DoorState::Closed) {
        return Some(DoorState::Closing);
    }

    if ctx.flags.open_notice && ctx.elapsed(ctx.timers.open) >= ctx.timing.time_to_report_open {
        ctx.flags.open_notice = false;
        let text = format!("{} is open", ctx.name);
        ctx.post_notice(NoticeKind::Opened, text);
    }

    if ctx.elapsed(ctx.open_timers.still_open) >= ctx.timing.time_to_report_still_open {
        ctx.open_timers.still_open = round_up_epoch(ctx.now, STILL_OPEN_ALIGN_MINS);
        let text = format!("{} is still open", ctx.name);
        ctx.post_notice(NoticeKind::StillOpen, text);
    }

    if let Some(limit) = ctx.timing.time_to_force_close {
        if ctx.elapsed(ctx.open_timers.force_close) >= limit {
            ctx.open_timers.force_close = ctx.now;
            ctx.commands.pulse_relay = true;
            let text = format!("{} force closed", ctx.name);
            ctx.post_notice(NoticeKind::ForceClosed, text);
        }
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSING
// ═══════════════════════════════════════════════════════════════════════════

fn closing_enter(ctx: &mut DoorContext) {
    ctx.timers.closing = ctx.now;
}

fn closing_update(ctx: &mut DoorContext) -> Option<DoorState> {
    ctx.reading?;
    (ctx.elapsed(ctx.timers.closing) >= ctx.timing.time_to_close).then_some(DoorState::Closed)
}
