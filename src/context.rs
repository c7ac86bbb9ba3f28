//! Per-test context.
//!
//! A fresh [`TestCx`] is created for every (test x implementation) run. It
//! carries the run's [`Delays`], a [`LogCollector`] for checkpoints, and the
//! [`ThreadTracker`] through which the test starts auxiliary threads.

use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Delays;
use crate::error::{Failure, TestOutcome};
use crate::logging::{LogCollector, LogLevel};
use crate::sync::{AuxThread, CountDownLatch, Interrupt, ThreadTracker};

/// Context handed to every contract test.
#[derive(Debug)]
pub struct TestCx {
    delays: Delays,
    log: LogCollector,
    threads: ThreadTracker,
    skip_reason: Mutex<Option<String>>,
}

impl TestCx {
    /// Creates a context with the given delays.
    #[must_use]
    pub fn new(delays: Delays) -> Self {
        Self::with_log_level(delays, LogLevel::Debug)
    }

    /// Creates a context whose collector keeps entries at or above `level`.
    #[must_use]
    pub fn with_log_level(delays: Delays, level: LogLevel) -> Self {
        Self {
            delays,
            log: LogCollector::new(level),
            threads: ThreadTracker::new(),
            skip_reason: Mutex::new(None),
        }
    }

    /// A context with default delays, for unit tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self::new(Delays::default())
    }

    /// Timing for this run.
    #[must_use]
    pub const fn delays(&self) -> &Delays {
        &self.delays
    }

    /// Shorthand for `delays().long`, the default bound on any wait.
    #[must_use]
    pub const fn long_delay(&self) -> Duration {
        self.delays.long
    }

    /// Checkpoint log for this test.
    #[must_use]
    pub const fn log(&self) -> &LogCollector {
        &self.log
    }

    /// Starts a tracked auxiliary thread.
    pub fn spawn<F>(&self, name: &str, body: F) -> AuxThread
    where
        F: FnOnce(&Interrupt) -> TestOutcome + Send + 'static,
    {
        self.log.debug(format!("spawn {name}"));
        self.threads.spawn(name, body)
    }

    /// Waits for `thread` with the default bound.
    pub fn await_termination(&self, thread: AuxThread) -> TestOutcome {
        thread.await_termination(self.delays.long)
    }

    /// Waits for `latch` with the default bound.
    pub fn await_latch(&self, latch: &CountDownLatch) -> TestOutcome {
        latch.await_open(self.delays.long)
    }

    /// Marks the test as not applicable to this implementation.
    ///
    /// The test should return `Ok(())` right after calling this.
    pub fn skip(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.log.info(format!("skipped: {reason}"));
        *self.skip_reason.lock() = Some(reason);
    }

    /// Why the test was skipped, if it was.
    #[must_use]
    pub fn skip_reason(&self) -> Option<String> {
        self.skip_reason.lock().clone()
    }

    /// Number of auxiliary threads started.
    #[must_use]
    pub fn threads_started(&self) -> usize {
        self.threads.started()
    }

    /// Verifies that every auxiliary thread has terminated.
    pub fn finish(&self) -> TestOutcome {
        self.threads
            .check_all_terminated(self.delays.long)
            .map_err(|failure| match failure {
                Failure::Liveness { what, bound } => Failure::Liveness {
                    what: format!("{what} at end of test"),
                    bound,
                },
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn skip_is_recorded() {
        let cx = TestCx::for_testing();
        assert_eq!(cx.skip_reason(), None);
        cx.skip("bounded only");
        assert_eq!(cx.skip_reason().as_deref(), Some("bounded only"));
    }

    #[test]
    fn spawned_threads_are_tracked() {
        let cx = TestCx::for_testing();
        let latch = Arc::new(CountDownLatch::new(1));
        let started = Arc::clone(&latch);
        let thread = cx.spawn("worker", move |_| {
            started.count_down();
            Ok(())
        });
        assert!(cx.await_latch(&latch).is_ok());
        assert!(cx.await_termination(thread).is_ok());
        assert_eq!(cx.threads_started(), 1);
        assert!(cx.finish().is_ok());
        assert!(!cx.log().is_empty());
    }

    #[test]
    fn unjoined_thread_fails_finish() {
        let delays = Delays {
            long: Duration::from_millis(20),
            ..Delays::default()
        };
        let cx = TestCx::new(delays);
        let _thread = cx.spawn("leaked", |interrupt| {
            while interrupt.park_timeout(Duration::from_secs(60)).is_ok() {}
            Ok(())
        });
        match cx.finish() {
            Err(Failure::Liveness { what, .. }) => assert!(what.contains("leaked")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
