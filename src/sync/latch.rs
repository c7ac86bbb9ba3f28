//! Count-down latch for test sequencing.
//!
//! The latch opens once `count` calls to [`CountDownLatch::count_down`] have
//! been made. Auxiliary threads count down right before the operation the main
//! thread is meant to observe, so the main thread never races thread start-up.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Failure, TestOutcome};

/// A one-shot counting gate.
#[derive(Debug)]
pub struct CountDownLatch {
    count: Mutex<usize>,
    opened: Condvar,
}

impl CountDownLatch {
    /// Creates a latch that opens after `count` count-downs.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            opened: Condvar::new(),
        }
    }

    /// Decrements the count, opening the latch when it reaches zero.
    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.opened.notify_all();
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Waits up to `timeout` for the latch to open. Returns whether it opened.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.opened.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    /// Waits up to `bound` for the latch, failing the test if it stays closed.
    pub fn await_open(&self, bound: Duration) -> TestOutcome {
        if self.wait_timeout(bound) {
            Ok(())
        } else {
            Err(Failure::liveness(
                format!("latch (count {})", self.count()),
                bound,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn opens_at_zero() {
        let latch = CountDownLatch::new(2);
        assert!(!latch.wait_timeout(Duration::ZERO));
        latch.count_down();
        assert_eq!(latch.count(), 1);
        latch.count_down();
        assert!(latch.wait_timeout(Duration::ZERO));
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn releases_waiter_from_other_thread() {
        let latch = Arc::new(CountDownLatch::new(1));
        let opener = Arc::clone(&latch);
        let handle = thread::spawn(move || opener.count_down());
        assert!(latch.wait_timeout(Duration::from_secs(10)));
        handle.join().unwrap();
    }

    #[test]
    fn closed_latch_is_liveness_failure() {
        let latch = CountDownLatch::new(1);
        let start = Instant::now();
        let outcome = latch.await_open(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(matches!(outcome, Err(Failure::Liveness { .. })));
    }
}
