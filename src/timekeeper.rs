//! Wall-clock helpers shared by the state machine, alert policy and web
//! surface.
//!
//! Door timestamps are epoch seconds (`f64`), the same unit the long-poll
//! watermark uses.  Calendar decisions (weekday, quiet hours, reminder
//! alignment) are taken on the *local* naive date-time.

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone, Timelike};

/// Reminder alignment for the "still open" timer, in minutes.
pub const STILL_OPEN_ALIGN_MINS: u32 = 5;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

/// Whole units rendered as `"<n> <unit>[s]"`.
const DURATION_UNITS: [(&str, u64); 4] = [("yr", YEAR), ("wk", WEEK), ("day", DAY), ("hr", HOUR)];

// ---------------------------------------------------------------------------
// Epoch <-> calendar
// ---------------------------------------------------------------------------

/// Convert epoch seconds to a local naive date-time.
///
/// Returns `None` for timestamps chrono cannot represent.
pub fn epoch_to_local(epoch: f64) -> Option<NaiveDateTime> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .map(|utc| utc.with_timezone(&Local).naive_local())
}

/// Convert a local naive date-time back to epoch seconds.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Times inside a DST gap are shifted forward by an hour.
pub fn local_to_epoch(local: NaiveDateTime) -> f64 {
    let resolved = Local
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(local + TimeDelta::hours(1))).earliest());
    match resolved {
        Some(dt) => dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9,
        None => local.and_utc().timestamp() as f64,
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Align `dt` to a multiple of `interval_mins` minutes.
///
/// Seconds are dropped.  A minute already on the boundary stays where it
/// is (`14:50:10` -> `14:50:00`); anything else advances to the next
/// boundary (`14:09:00` -> `14:10:00`, `23:59:10` -> `00:00:00` next day).
pub fn round_up_to_interval(dt: NaiveDateTime, interval_mins: u32) -> NaiveDateTime {
    let interval = interval_mins.max(1);
    let base = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt);
    let rem = base.minute() % interval;
    if rem == 0 {
        base
    } else {
        base + TimeDelta::minutes(i64::from(interval - rem))
    }
}

/// [`round_up_to_interval`] on epoch seconds, through local time.
pub fn round_up_epoch(epoch: f64, interval_mins: u32) -> f64 {
    match epoch_to_local(epoch) {
        Some(local) => local_to_epoch(round_up_to_interval(local, interval_mins)),
        None => epoch,
    }
}

// ---------------------------------------------------------------------------
// Duration formatting
// ---------------------------------------------------------------------------

/// Render a duration in whole seconds for operator messages.
///
/// ```text
/// 43      -> "43s"
/// 65      -> "01:05"
/// 3600    -> "1 hr"
/// 694861  -> "1 wk, 1 day, 1 hr, 01:01"
/// ```
pub fn format_duration(total_secs: u64) -> String {
    if total_secs == 0 {
        return "0s".to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut rest = total_secs;
    for (unit, div) in DURATION_UNITS {
        let amount = rest / div;
        rest %= div;
        if amount > 0 {
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{amount} {unit}{plural}"));
        }
    }

    let mins = rest / MINUTE;
    let secs = rest % MINUTE;
    if mins > 0 || secs > 0 {
        if total_secs <= MINUTE || (mins == 0 && secs > 0) {
            // A bare minute reads as "60s", not "01:00".
            let secs = if secs == 0 { 60 } else { secs };
            parts.push(format!("{secs:02}s"));
        } else {
            parts.push(format!("{mins:02}:{secs:02}"));
        }
    }

    parts.join(", ")
}

/// [`format_duration`] for a float span; negative spans render as `0s`.
pub fn format_span(secs: f64) -> String {
    if secs.is_finite() && secs > 0.0 {
        format_duration(secs as u64)
    } else {
        format_duration(0)
    }
}
