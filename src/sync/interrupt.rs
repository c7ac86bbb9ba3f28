//! Thread interruption.
//!
//! Rust threads cannot be interrupted, so every blocking operation under test
//! takes an explicit `&Interrupt`. An interrupt is sticky until observed:
//! [`Interrupt::checkpoint`] tests and clears it, so the code that reports
//! `Interrupted` is also the code that consumes the request.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};
use std::time::Duration;

use crate::error::ContainerError;

/// Interrupt handle for one thread.
#[derive(Debug, Default)]
pub struct Interrupt {
    requested: AtomicBool,
    thread: OnceLock<Thread>,
}

impl Interrupt {
    /// Creates a handle not yet bound to a thread.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle bound to the calling thread.
    #[must_use]
    pub fn current() -> Self {
        let interrupt = Self::new();
        interrupt.bind(thread::current());
        interrupt
    }

    /// Binds the handle to `thread` so interrupts unpark it. First bind wins.
    pub fn bind(&self, thread: Thread) {
        let _ = self.thread.set(thread);
    }

    /// Requests an interrupt and wakes the bound thread if it is parked.
    pub fn interrupt(&self) {
        self.requested.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.get() {
            thread.unpark();
        }
    }

    /// Whether an interrupt is pending. Does not clear it.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clears the pending interrupt, returning whether one was pending.
    pub fn clear(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    /// Observes a pending interrupt: clears it and returns `Interrupted`.
    pub fn checkpoint(&self) -> Result<(), ContainerError> {
        if self.clear() {
            Err(ContainerError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Parks the calling thread for at most `timeout`, waking early on interrupt.
    ///
    /// Spurious wakeups are allowed; callers re-check their condition.
    pub fn park_timeout(&self, timeout: Duration) -> Result<(), ContainerError> {
        self.checkpoint()?;
        thread::park_timeout(timeout);
        self.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn checkpoint_clears() {
        let interrupt = Interrupt::current();
        assert!(interrupt.checkpoint().is_ok());
        interrupt.interrupt();
        assert!(interrupt.is_interrupted());
        assert_eq!(interrupt.checkpoint(), Err(ContainerError::Interrupted));
        assert!(!interrupt.is_interrupted());
        assert!(interrupt.checkpoint().is_ok());
    }

    #[test]
    fn interrupt_wakes_parked_thread() {
        let interrupt = Arc::new(Interrupt::new());
        let parked = Arc::clone(&interrupt);
        let handle = thread::spawn(move || {
            let start = Instant::now();
            loop {
                if parked.park_timeout(Duration::from_secs(60)).is_err() {
                    return start.elapsed();
                }
            }
        });
        interrupt.bind(handle.thread().clone());
        interrupt.interrupt();
        let waited = handle.join().unwrap();
        assert!(waited < Duration::from_secs(60));
    }
}
