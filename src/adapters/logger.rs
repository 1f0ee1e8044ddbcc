//! `log` backend writing timestamped lines to the log file.
//!
//! ```text
//! Sat, 11/17/18 12:05:01 INFO Left is open
//! ```
//!
//! The `log` web route tails the same file.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use log::{LevelFilter, Log, Metadata, Record};

pub struct FileLogger {
    out: Mutex<Box<dyn Write + Send>>,
    level: LevelFilter,
}

impl FileLogger {
    /// Append to `path`, creating it if needed.
    pub fn open(path: &Path, level: LevelFilter) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_writer(Box::new(file), level))
    }

    /// Write to stderr (debug mode).
    pub fn stderr(level: LevelFilter) -> Self {
        Self::with_writer(Box::new(io::stderr()), level)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, level: LevelFilter) -> Self {
        Self {
            out: Mutex::new(out),
            level,
        }
    }

    /// Install as the global logger.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

/// One log line without the trailing newline.
pub fn format_line(at: NaiveDateTime, level: log::Level, message: &str) -> String {
    format!("{} {level} {message}", at.format("%a, %m/%d/%y %H:%M:%S"))
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            Local::now().naive_local(),
            record.level(),
            &record.args().to_string(),
        );
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.flush();
        }
    }
}
