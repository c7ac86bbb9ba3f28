//! Error types for the contract test kit.
//!
//! Two families of errors flow through the kit:
//!
//! - [`ContainerError`]: what a container under test reports back from an
//!   operation (rejected null, interrupted, unsupported, ...). Contracts assert on
//!   these values; they are data, not harness failures.
//! - [`Failure`]: why a test method failed. Failures are local to one test
//!   method and are classified by [`FailureKind`] in the run report.
//!
//! # Failure Categories
//!
//! - **Contract**: the container broke a behavioral promise
//! - **Liveness**: a thread that should have been released did not terminate
//! - **Cancellation**: an interrupted wait hung, succeeded, or left residual state
//! - **Panic**: the test body or an auxiliary thread panicked

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a container under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContainerError {
    /// A null element, key, or value was rejected.
    #[error("null element rejected")]
    NullElement,

    /// A blocking operation observed an interrupt.
    #[error("interrupted while waiting")]
    Interrupted,

    /// The implementation does not provide this operation.
    #[error("operation not supported")]
    Unsupported,

    /// The underlying channel lost its other half.
    #[error("container disconnected")]
    Disconnected,

    /// Serializing or deserializing the container failed.
    #[error("serialization round trip failed")]
    Serialization,
}

/// Classification of a test failure, as shown in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Programming-contract violation by the container.
    Contract,
    /// A thread failed to terminate within its bound.
    Liveness,
    /// A blocked operation mishandled an interrupt.
    Cancellation,
    /// The test body or a helper thread panicked.
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract => write!(f, "contract"),
            Self::Liveness => write!(f, "liveness"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Panic => write!(f, "panic"),
        }
    }
}

/// Why a test method failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// An assertion about the container's behavior did not hold.
    #[error("{message} (at {location})")]
    Contract {
        /// The failed assertion.
        message: String,
        /// `file:line` of the assertion.
        location: String,
    },

    /// A thread did not terminate within the bounded wait.
    #[error("{what} did not terminate within {bound:?}")]
    Liveness {
        /// What was being waited for.
        what: String,
        /// The bound that elapsed.
        bound: Duration,
    },

    /// A blocked operation did not respond correctly to an interrupt.
    #[error("{0}")]
    Cancellation(String),

    /// An auxiliary thread panicked.
    #[error("thread '{thread}' panicked: {message}")]
    ThreadPanicked {
        /// Name of the auxiliary thread.
        thread: String,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The test body panicked.
    #[error("test panicked: {0}")]
    Panicked(String),
}

impl Failure {
    /// Creates a contract failure at the given source location.
    pub fn contract(message: impl Into<String>, file: &str, line: u32) -> Self {
        Self::Contract {
            message: message.into(),
            location: format!("{file}:{line}"),
        }
    }

    /// Creates a liveness failure.
    pub fn liveness(what: impl Into<String>, bound: Duration) -> Self {
        Self::Liveness {
            what: what.into(),
            bound,
        }
    }

    /// Creates a cancellation-handling failure.
    pub fn cancellation(message: impl Into<String>) -> Self {
        Self::Cancellation(message.into())
    }

    /// Returns the report classification of this failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Contract { .. } => FailureKind::Contract,
            Self::Liveness { .. } => FailureKind::Liveness,
            Self::Cancellation(_) => FailureKind::Cancellation,
            Self::ThreadPanicked { .. } | Self::Panicked(_) => FailureKind::Panic,
        }
    }
}

/// Result of a single test method.
pub type TestOutcome = Result<(), Failure>;

/// Errors raised while assembling a [`TckConfig`](crate::config::TckConfig).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The delay factor must be finite and positive.
    #[error("invalid delay factor {0}: must be finite and > 0")]
    InvalidDelayFactor(f64),

    /// The log level name was not recognised.
    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),

    /// An environment value could not be parsed.
    #[error("failed to parse {key}: {reason}")]
    Parse {
        /// Variable name.
        key: String,
        /// Parser message.
        reason: String,
    },
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds() {
        assert_eq!(
            Failure::contract("x", "a.rs", 1).kind(),
            FailureKind::Contract
        );
        assert_eq!(
            Failure::liveness("t", Duration::from_millis(5)).kind(),
            FailureKind::Liveness
        );
        assert_eq!(
            Failure::cancellation("late").kind(),
            FailureKind::Cancellation
        );
        assert_eq!(Failure::Panicked("boom".into()).kind(), FailureKind::Panic);
    }

    #[test]
    fn contract_failure_display_includes_location() {
        let failure = Failure::contract("size mismatch", "src/contracts/map.rs", 42);
        let rendered = failure.to_string();
        assert!(rendered.contains("size mismatch"));
        assert!(rendered.contains("src/contracts/map.rs:42"));
    }

    #[test]
    fn panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
