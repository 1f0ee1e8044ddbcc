//! Notification gating.
//!
//! ```text
//! can_alert(now) = enabled
//!                ∧ day_of_week_matches(now)
//!                ∧ time_window_matches(now)
//!                ∧ ¬in_quiet_hours(now)
//! ```
//!
//! Quiet hours are fixed (03:58–04:05) and cannot be configured away.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use heapless::Vec as HVec;

use crate::config::AlertConfig;
use crate::error::ConfigError;
use crate::fsm::context::NoticeKind;

/// Start of the daily suppression window (inclusive).
pub const QUIET_START: (u32, u32) = (3, 58);
/// End of the daily suppression window (inclusive).
pub const QUIET_END: (u32, u32) = (4, 5);

/// Parsed, immutable alert policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPolicy {
    enabled: bool,
    /// Empty = every day.
    days: HVec<Weekday, 7>,
    /// `None` = all day.
    window: Option<(NaiveTime, NaiveTime)>,
    when_opened: bool,
    when_closed: bool,
}

impl AlertPolicy {
    /// Build from the `alerts` config section.
    ///
    /// Rejects a half-specified window and unknown day names.
    pub fn from_config(cfg: &AlertConfig) -> Result<Self, ConfigError> {
        let window = match (cfg.from_time.trim(), cfg.to_time.trim()) {
            ("", "") => None,
            ("", _) | (_, "") => {
                return Err(ConfigError::ValidationFailed(
                    "from_time and to_time must both be set or both be empty",
                ));
            }
            (from, to) => Some((parse_hhmm(from)?, parse_hhmm(to)?)),
        };

        let mut days: HVec<Weekday, 7> = HVec::new();
        for name in cfg
            .on_days_of_week
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let day = name
                .parse::<Weekday>()
                .map_err(|_| ConfigError::ValidationFailed("unknown day in on_days_of_week"))?;
            if !days.contains(&day) {
                // At most 7 distinct weekdays, so this never overflows.
                let _ = days.push(day);
            }
        }

        Ok(Self {
            enabled: cfg.enabled,
            days,
            window,
            when_opened: cfg.when_opened,
            when_closed: cfg.when_closed,
        })
    }

    /// Whether any notice may go out at local time `now`.
    pub fn can_alert_at(&self, now: NaiveDateTime) -> bool {
        self.enabled
            && self.day_of_week_matches(now)
            && self.time_window_matches(now.time())
            && !in_quiet_hours(now.time())
    }

    /// Whether a notice of `kind` may go out at `now`.
    pub fn allows(&self, kind: NoticeKind, now: NaiveDateTime) -> bool {
        self.wants(kind) && self.can_alert_at(now)
    }

    /// Per-kind switch, ignoring time of day.
    pub fn wants(&self, kind: NoticeKind) -> bool {
        match kind {
            NoticeKind::Opened | NoticeKind::StillOpen | NoticeKind::ForceClosed => {
                self.when_opened
            }
            NoticeKind::Closed => self.when_closed,
            NoticeKind::Startup => true,
        }
    }

    pub fn day_of_week_matches(&self, now: NaiveDateTime) -> bool {
        self.days.is_empty() || self.days.contains(&now.weekday())
    }

    /// Same-day inclusive window; a window that wraps midnight never matches.
    pub fn time_window_matches(&self, t: NaiveTime) -> bool {
        match self.window {
            None => true,
            Some((from, to)) => from <= t && t <= to,
        }
    }
}

/// Fixed daily suppression window.
pub fn in_quiet_hours(t: NaiveTime) -> bool {
    let start = NaiveTime::from_hms_opt(QUIET_START.0, QUIET_START.1, 0).unwrap_or(NaiveTime::MIN);
    let end = NaiveTime::from_hms_opt(QUIET_END.0, QUIET_END.1, 0).unwrap_or(NaiveTime::MIN);
    start <= t && t <= end
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| ConfigError::ValidationFailed("alert window times must be HH:MM"))
}
