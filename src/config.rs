//! Controller configuration
//!
//! All tunable parameters for the door controller, loaded once at startup
//! from a JSON file and passed by value to every component that needs
//! them.  Nothing here is mutated after startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on configured doors (fixed-capacity door table).
pub const MAX_DOORS: usize = 8;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Web-facing settings.
    pub site: SiteConfig,
    /// Dwell and reminder durations.
    pub timing: TimingConfig,
    /// Notification policy and channel.
    pub alerts: AlertConfig,
    /// Persistence locations.
    pub storage: StorageConfig,
    /// Log file and level.
    pub logging: LoggingConfig,
    /// One entry per physical door.
    pub doors: Vec<DoorConfig>,
    /// Use simulated pins instead of GPIO; relay pulses flip the sensor.
    pub debug: bool,
    /// GPIO line of the optional motion sensor.
    pub motion_pin: Option<u8>,
    /// Supervisor tick interval (milliseconds).
    pub control_loop_interval_ms: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            timing: TimingConfig::default(),
            alerts: AlertConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            doors: Vec::new(),
            debug: false,
            motion_pin: None,
            control_loop_interval_ms: 1000, // 1 Hz
        }
    }
}

// --- Site ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// TCP port the HTTP layer should listen on.
    pub port: u16,
    /// Manual relay clicks accepted per second (token refill rate).
    pub clicks_per_sec: u64,
    /// Burst of manual relay clicks accepted at once.
    pub click_burst: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            clicks_per_sec: 1,
            click_burst: 3,
        }
    }
}

// --- Timing ---

/// Durations in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Dwell in OPENING before the door is considered OPEN.
    #[serde(alias = "to_open_door")]
    pub time_to_open: u32,
    /// Dwell in CLOSING before the door is considered CLOSED.
    #[serde(alias = "to_close_door")]
    pub time_to_close: u32,
    /// Delay after OPEN before the first "is open" notice.
    #[serde(alias = "to_report_open")]
    pub time_to_report_open: u32,
    /// Interval between "is still open" reminders.
    #[serde(alias = "to_report_still_open")]
    pub time_to_report_still_open: u32,
    /// Auto-close after this long in OPEN; `None` disables force-close.
    #[serde(alias = "to_force_close")]
    pub time_to_force_close: Option<u32>,
    /// How long the relay is held low per pulse (milliseconds).
    pub relay_pulse_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            time_to_open: 10,
            time_to_close: 10,
            time_to_report_open: 5 * 60,
            time_to_report_still_open: 30 * 60,
            time_to_force_close: None,
            relay_pulse_ms: 200,
        }
    }
}

// --- Alerts ---

/// Delivery channel for operator notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[serde(alias = "smtp")]
    Email,
    #[serde(alias = "pushbullet", alias = "pushover")]
    Push,
}

impl core::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Push => write!(f, "push"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Master switch for notifications.
    #[serde(alias = "use_alerts")]
    pub enabled: bool,
    /// Send open / still-open / force-close notices.
    pub when_opened: bool,
    /// Send closed notices.
    pub when_closed: bool,
    /// Window start, `HH:MM`; empty together with `to_time` = all day.
    pub from_time: String,
    /// Window end, `HH:MM` (inclusive).
    pub to_time: String,
    /// Comma-separated day names (`Mon,Tue,...`); empty = every day.
    pub on_days_of_week: String,
    /// Active channel; `None` disables delivery.
    #[serde(alias = "alert_type")]
    pub channel: Option<ChannelKind>,
    /// Bounded wait for one transport call (milliseconds).
    pub send_timeout_ms: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            when_opened: true,
            when_closed: true,
            from_time: String::new(),
            to_time: String::new(),
            on_days_of_week: String::new(),
            channel: None,
            send_timeout_ms: 10_000,
        }
    }
}

// --- Storage ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File holding the persisted last-open table.
    pub last_open_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            last_open_file: PathBuf::from("garageCache"),
        }
    }
}

// --- Logging ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file; also served by the `log` route.
    #[serde(alias = "logfile")]
    pub file: PathBuf,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("doorwatch.log"),
            level: "info".to_string(),
        }
    }
}

// --- Doors ---

/// Static description of one physical door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorConfig {
    /// Stable identifier used by the web surface and the last-open store.
    pub id: String,
    /// Display name used in notices.
    pub name: String,
    /// GPIO line driving the opener relay.
    pub relay_pin: u8,
    /// GPIO line of the door-position switch.
    pub state_pin: u8,
    /// Raw sense value that means "closed".
    #[serde(alias = "closed_value")]
    pub closed_sense_value: u8,
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl ControllerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        validate_config(&cfg)?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Find a door by id.
    pub fn door(&self, id: &str) -> Option<&DoorConfig> {
        self.doors.iter().find(|d| d.id == id)
    }
}

/// Range-check every field; rejects rather than clamps.
pub fn validate_config(cfg: &ControllerConfig) -> Result<(), ConfigError> {
    if cfg.doors.is_empty() {
        return Err(ConfigError::ValidationFailed("doors must not be empty"));
    }
    if cfg.doors.len() > MAX_DOORS {
        return Err(ConfigError::ValidationFailed("at most 8 doors are supported"));
    }
    for (i, door) in cfg.doors.iter().enumerate() {
        if door.id.is_empty() {
            return Err(ConfigError::ValidationFailed("door id must not be empty"));
        }
        if door.closed_sense_value > 1 {
            return Err(ConfigError::ValidationFailed(
                "closed_sense_value must be 0 or 1",
            ));
        }
        if door.relay_pin == door.state_pin {
            return Err(ConfigError::ValidationFailed(
                "relay_pin and state_pin must differ",
            ));
        }
        if cfg.doors[..i].iter().any(|d| d.id == door.id) {
            return Err(ConfigError::ValidationFailed("door ids must be unique"));
        }
    }
    if !(100..=5000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 100–5000",
        ));
    }
    if !(50..=2000).contains(&cfg.timing.relay_pulse_ms) {
        return Err(ConfigError::ValidationFailed(
            "relay_pulse_ms must be 50–2000",
        ));
    }
    if cfg.timing.time_to_report_still_open == 0 {
        return Err(ConfigError::ValidationFailed(
            "time_to_report_still_open must be > 0",
        ));
    }
    if cfg.timing.time_to_force_close == Some(0) {
        return Err(ConfigError::ValidationFailed(
            "time_to_force_close must be > 0 (omit it to disable)",
        ));
    }
    if cfg.site.clicks_per_sec == 0 || cfg.site.click_burst == 0 {
        return Err(ConfigError::ValidationFailed(
            "clicks_per_sec and click_burst must be > 0",
        ));
    }
    if !(100..=60_000).contains(&cfg.alerts.send_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "send_timeout_ms must be 100–60000",
        ));
    }
    // Window and day filter are parsed by the policy; surface errors here.
    crate::policy::AlertPolicy::from_config(&cfg.alerts)?;
    if cfg.logging.level.parse::<log::LevelFilter>().is_err() {
        return Err(ConfigError::ValidationFailed(
            "logging.level must be error, warn, info, debug or trace",
        ));
    }
    Ok(())
}
