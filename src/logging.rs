//! Logging for test runs.
//!
//! Structured events go through `tracing`; [`init_logging`] installs a
//! `tracing-subscriber` formatter for the command-line runner. Each test
//! method additionally gets a [`LogCollector`] whose entries are attached to
//! the record of a failed test in the run report.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Log level for the kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed tracing information.
    Trace,
    /// Debug information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl LogLevel {
    /// Returns the `EnvFilter` directive for this level.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "TRACE"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::UnknownLogLevel(s.to_string())),
        }
    }
}

/// Installs a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` wins over `level` when set. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A log entry captured during one test method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Milliseconds since the collector was created.
    pub timestamp_ms: u64,
}

/// Collector for checkpoint messages recorded by a test method.
///
/// Cheap to clone; clones share the same buffer, so auxiliary threads can log
/// into the record of the test that spawned them.
#[derive(Debug, Clone)]
pub struct LogCollector {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    start: Instant,
    min_level: LogLevel,
}

impl LogCollector {
    /// Creates a collector keeping entries at or above `min_level`.
    #[must_use]
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            start: Instant::now(),
            min_level,
        }
    }

    /// Records an entry if it meets the minimum level; also forwards it to `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Trace => tracing::trace!(checkpoint = %message),
            LogLevel::Debug => tracing::debug!(checkpoint = %message),
            LogLevel::Info => tracing::info!(checkpoint = %message),
            LogLevel::Warn => tracing::warn!(checkpoint = %message),
            LogLevel::Error => tracing::error!(checkpoint = %message),
        }
        if level < self.min_level {
            return;
        }
        let timestamp_ms = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.entries.lock().push(LogEntry {
            level,
            message,
            timestamp_ms,
        });
    }

    /// Debug-level checkpoint.
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    /// Info-level checkpoint.
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Warn-level checkpoint.
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    /// Drains all collected entries.
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of collected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

/// Formats an entry as `[    12ms] WARN  message`.
#[must_use]
pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "[{:>6}ms] {:5} {}",
        entry.timestamp_ms, entry.level, entry.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn log_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" trace ".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert_eq!(
            "loud".parse::<LogLevel>(),
            Err(ConfigError::UnknownLogLevel("loud".into()))
        );
    }

    #[test]
    fn collector_filters_by_level() {
        let collector = LogCollector::new(LogLevel::Info);
        collector.debug("filtered");
        collector.info("kept");
        collector.warn("also kept");

        let entries = collector.drain();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "kept");
        assert_eq!(entries[1].level, LogLevel::Warn);
        assert!(collector.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let collector = LogCollector::default();
        let clone = collector.clone();
        std::thread::spawn(move || clone.info("from aux thread"))
            .join()
            .unwrap();
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn format_entry_basic() {
        let entry = LogEntry {
            level: LogLevel::Info,
            message: "took element".into(),
            timestamp_ms: 42,
        };
        let formatted = format_entry(&entry);
        assert!(formatted.contains("42ms"));
        assert!(formatted.contains("INFO"));
        assert!(formatted.contains("took element"));
    }
}
