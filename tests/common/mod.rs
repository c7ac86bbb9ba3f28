//! Shared helpers for integration tests.

#![allow(dead_code, unused_macros)]

use std::sync::Once;

use contract_tck::descriptor::Descriptor;
use contract_tck::{Capabilities, LogLevel};

static INIT: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
///
/// `TEST_LOG_LEVEL` picks the level; `RUST_LOG` overrides it.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let level = std::env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|raw| raw.parse::<LogLevel>().ok())
            .unwrap_or(LogLevel::Info);
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_directive()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A descriptor that only carries a name and capabilities.
#[derive(Debug, Clone)]
pub struct Named {
    pub name: &'static str,
    pub capabilities: Capabilities,
}

impl Descriptor for Named {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = $name, "=== TEST PHASE ===");
    };
}

macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST COMPLETE ===");
    };
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::info!(test = $name, $($key = ?$value),+, "=== TEST COMPLETE ===");
    };
}

macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
