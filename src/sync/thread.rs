//! Auxiliary test threads.
//!
//! A test method may start a few helper threads to exercise blocking behavior.
//! Each one is named, carries its own [`Interrupt`], returns a
//! [`TestOutcome`], and is registered with a [`ThreadTracker`] so the runner
//! can verify nothing outlives the method.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::Interrupt;
use crate::error::{Failure, TestOutcome, panic_message};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Marks a thread finished when dropped, including during unwinding.
struct DoneGuard(Arc<AtomicBool>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A running auxiliary thread.
#[derive(Debug)]
pub struct AuxThread {
    name: String,
    handle: JoinHandle<TestOutcome>,
    interrupt: Arc<Interrupt>,
    done: Arc<AtomicBool>,
}

impl AuxThread {
    /// Starts a named thread running `body`.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to create the thread.
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&Interrupt) -> TestOutcome + Send + 'static,
    {
        let name = name.into();
        let interrupt = Arc::new(Interrupt::new());
        let done = Arc::new(AtomicBool::new(false));

        let thread_interrupt = Arc::clone(&interrupt);
        let guard = DoneGuard(Arc::clone(&done));
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = guard;
                tracing::debug!(thread = ?thread::current().name(), "aux thread started");
                body(&thread_interrupt)
            })
            .expect("failed to spawn aux thread");
        interrupt.bind(handle.thread().clone());

        Self {
            name,
            handle,
            interrupt,
            done,
        }
    }

    /// The thread's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interrupts the thread.
    pub fn interrupt(&self) {
        tracing::debug!(thread = %self.name, "interrupting aux thread");
        self.interrupt.interrupt();
    }

    /// Whether the thread has finished running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Waits up to `bound` for the thread to terminate and returns its outcome.
    ///
    /// If the thread is still running when the bound elapses it is interrupted
    /// (in the hope it terminates later) and detached, and the test fails with
    /// a liveness failure.
    pub fn await_termination(self, bound: Duration) -> TestOutcome {
        let deadline = Instant::now() + bound;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(thread = %self.name, ?bound, "aux thread did not terminate");
                self.interrupt.interrupt();
                return Err(Failure::liveness(format!("thread '{}'", self.name), bound));
            }
            thread::sleep(POLL_INTERVAL);
        }
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => Err(Failure::ThreadPanicked {
                thread: self.name,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    fn tracking(&self) -> Tracked {
        Tracked {
            name: self.name.clone(),
            interrupt: Arc::clone(&self.interrupt),
            done: Arc::clone(&self.done),
        }
    }
}

#[derive(Debug)]
struct Tracked {
    name: String,
    interrupt: Arc<Interrupt>,
    done: Arc<AtomicBool>,
}

/// Records every auxiliary thread a test starts.
#[derive(Debug, Default)]
pub struct ThreadTracker {
    threads: Mutex<Vec<Tracked>>,
}

impl ThreadTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts and tracks a thread.
    pub fn spawn<F>(&self, name: impl Into<String>, body: F) -> AuxThread
    where
        F: FnOnce(&Interrupt) -> TestOutcome + Send + 'static,
    {
        let thread = AuxThread::spawn(name, body);
        self.threads.lock().push(thread.tracking());
        thread
    }

    /// Number of threads started so far.
    #[must_use]
    pub fn started(&self) -> usize {
        self.threads.lock().len()
    }

    /// Fails if any tracked thread is still running after `bound`.
    ///
    /// Stragglers are interrupted before the failure is returned.
    pub fn check_all_terminated(&self, bound: Duration) -> TestOutcome {
        let deadline = Instant::now() + bound;
        let threads = self.threads.lock();
        for tracked in threads.iter() {
            while !tracked.done.load(Ordering::SeqCst) {
                if Instant::now() >= deadline {
                    tracked.interrupt.interrupt();
                    return Err(Failure::liveness(
                        format!("thread '{}' (never joined)", tracked.name),
                        bound,
                    ));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContainerError;

    #[test]
    fn returns_thread_outcome() {
        let thread = AuxThread::spawn("ok", |_| Ok(()));
        assert_eq!(thread.name(), "ok");
        assert!(thread.await_termination(Duration::from_secs(10)).is_ok());

        let thread = AuxThread::spawn("fails", |_| {
            Err(Failure::contract("inner", file!(), line!()))
        });
        assert!(matches!(
            thread.await_termination(Duration::from_secs(10)),
            Err(Failure::Contract { .. })
        ));
    }

    #[test]
    fn panic_is_reported_with_thread_name() {
        let thread = AuxThread::spawn("boom", |_| panic!("kaboom"));
        match thread.await_termination(Duration::from_secs(10)) {
            Err(Failure::ThreadPanicked { thread, message }) => {
                assert_eq!(thread, "boom");
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn stuck_thread_is_liveness_failure_then_interrupted() {
        let tracker = ThreadTracker::new();
        let thread = tracker.spawn("stuck", |interrupt| {
            while interrupt.park_timeout(Duration::from_secs(60)).is_ok() {}
            Ok(())
        });
        let start = Instant::now();
        let outcome = thread.await_termination(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(matches!(outcome, Err(Failure::Liveness { .. })));
        // the interrupt issued on timeout lets the thread finish
        assert!(tracker.check_all_terminated(Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn tracker_reports_unjoined_thread() {
        let tracker = ThreadTracker::new();
        let thread = tracker.spawn("forgotten", |interrupt| {
            while interrupt.park_timeout(Duration::from_secs(60)).is_ok() {}
            Err(Failure::cancellation("interrupted late"))
        });
        assert_eq!(tracker.started(), 1);
        assert!(!thread.is_finished());
        let outcome = tracker.check_all_terminated(Duration::from_millis(20));
        assert!(matches!(outcome, Err(Failure::Liveness { .. })));
        assert!(matches!(
            thread.await_termination(Duration::from_secs(10)),
            Err(Failure::Cancellation(_))
        ));
    }

    #[test]
    fn interrupt_reaches_thread() {
        let thread = AuxThread::spawn("waiter", |interrupt| {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(60) {
                if interrupt.park_timeout(Duration::from_millis(5)) == Err(ContainerError::Interrupted)
                {
                    return Ok(());
                }
            }
            Err(Failure::cancellation("never interrupted"))
        });
        thread.interrupt();
        assert!(thread.await_termination(Duration::from_secs(10)).is_ok());
    }
}
