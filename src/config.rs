//! Run configuration and timing.
//!
//! Configuration is layered: defaults, then environment, then explicit
//! overrides from the caller (the CLI applies its flags last).
//!
//! | variable           | field          |
//! |--------------------|----------------|
//! | `TCK_DELAY_FACTOR` | `delay_factor` |
//! | `TCK_FILTER`       | `filter`       |
//! | `TEST_LOG_LEVEL`   | `log_level`    |
//! | `TCK_REPORT`       | `report_path`  |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logging::LogLevel;

/// Top-level configuration for a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TckConfig {
    /// Multiplier applied to every delay; raise it on slow machines.
    pub delay_factor: f64,
    /// Only run tests whose `suite/implementation/id` contains this string.
    pub filter: Option<String>,
    /// Minimum level for logs.
    pub log_level: LogLevel,
    /// Where to write the JSON report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for TckConfig {
    fn default() -> Self {
        Self {
            delay_factor: 1.0,
            filter: None,
            log_level: LogLevel::Info,
            report_path: None,
        }
    }
}

impl TckConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_source(|key| std::env::var(key).ok())
    }

    /// Overlays values from `lookup` (an environment-like source).
    pub fn with_env_source<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("TCK_DELAY_FACTOR") {
            self.delay_factor = raw.trim().parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::Parse {
                    key: "TCK_DELAY_FACTOR".into(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(filter) = lookup("TCK_FILTER").filter(|f| !f.is_empty()) {
            self.filter = Some(filter);
        }
        if let Some(level) = lookup("TEST_LOG_LEVEL") {
            self.log_level = level.parse()?;
        }
        if let Some(path) = lookup("TCK_REPORT").filter(|p| !p.is_empty()) {
            self.report_path = Some(PathBuf::from(path));
        }
        self.validate()?;
        Ok(self)
    }

    /// Set the delay factor.
    #[must_use]
    pub fn delay_factor(mut self, factor: f64) -> Self {
        self.delay_factor = factor;
        self
    }

    /// Set the test filter.
    #[must_use]
    pub fn filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the report path.
    #[must_use]
    pub fn report_path(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.delay_factor.is_finite() || self.delay_factor <= 0.0 {
            return Err(ConfigError::InvalidDelayFactor(self.delay_factor));
        }
        Ok(())
    }

    /// Delays derived from the delay factor.
    #[must_use]
    pub fn delays(&self) -> Delays {
        Delays::scaled(self.delay_factor)
    }
}

/// Delays for timing-dependent tests.
///
/// `long` is a multiple of `short`; `timeout` must stay longer than a
/// scheduling quantum without growing linearly with the factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    /// The shortest timed delay.
    pub short: Duration,
    /// 200 x short; the default bound for waiting on a thread.
    pub long: Duration,
    /// Bound used by tests that verify an operation blocks or times out.
    pub timeout: Duration,
}

impl Delays {
    /// Delays scaled by `factor`.
    #[must_use]
    pub fn scaled(factor: f64) -> Self {
        let short = nanos(50_000_000.0 * factor);
        Self {
            short,
            long: short * 200,
            timeout: nanos(12_000_000.0 * factor.cbrt()),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn nanos(value: f64) -> Duration {
    Duration::from_nanos(value.round().max(1.0) as u64)
}

impl Default for Delays {
    fn default() -> Self {
        Self::scaled(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = TckConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delays(), Delays::default());
    }

    #[test]
    fn default_delays_match_multiples() {
        let delays = Delays::default();
        assert_eq!(delays.short, Duration::from_millis(50));
        assert_eq!(delays.long, Duration::from_secs(10));
        assert_eq!(delays.timeout, Duration::from_millis(12));
    }

    #[test]
    fn timeout_grows_sublinearly() {
        let delays = Delays::scaled(8.0);
        assert_eq!(delays.short, Duration::from_millis(400));
        assert_eq!(delays.timeout, Duration::from_millis(24));
    }

    #[test]
    fn env_overlay() {
        let config = TckConfig::default()
            .with_env_source(source(&[
                ("TCK_DELAY_FACTOR", "2.5"),
                ("TCK_FILTER", "blocking"),
                ("TEST_LOG_LEVEL", "debug"),
                ("TCK_REPORT", "target/tck.json"),
            ]))
            .expect("valid env");
        assert!((config.delay_factor - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.filter.as_deref(), Some("blocking"));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.report_path, Some(PathBuf::from("target/tck.json")));
    }

    #[test]
    fn env_overlay_rejects_bad_values() {
        let err = TckConfig::default()
            .with_env_source(source(&[("TCK_DELAY_FACTOR", "fast")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = TckConfig::default()
            .with_env_source(source(&[("TCK_DELAY_FACTOR", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidDelayFactor(0.0));

        let err = TckConfig::default()
            .with_env_source(source(&[("TEST_LOG_LEVEL", "chatty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLogLevel(_)));
    }

    #[test]
    fn overrides_apply_after_env() {
        let config = TckConfig::default()
            .with_env_source(source(&[("TCK_FILTER", "map")]))
            .expect("valid env")
            .filter(Some("queue".into()))
            .delay_factor(3.0);
        assert_eq!(config.filter.as_deref(), Some("queue"));
        assert!(config.validate().is_ok());
    }
}
