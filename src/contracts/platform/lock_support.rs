//! Park and unpark (`park-*`).
//!
//! `thread::park` may return spuriously, so every wait here loops on its own
//! condition; only "eventually returns" and "never returns early on every
//! attempt" are asserted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use crate::context::TestCx;
use crate::descriptor::Descriptor;
use crate::error::TestOutcome;
use crate::registry::{Contract, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the park/unpark contract.
pub const SUITE: &str = "lock_support";

/// The park/unpark contract.
pub fn contract<D: Descriptor>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "park-001",
                name: "Unpark before park",
                description: "A permit granted before park makes the next park return at once",
                category: TestCategory::LockSupport,
                tags: ["permit"],
                expected: "park returns well before the long delay",
                bound: Descriptor,
                test: |imp, cx| unpark_before_park(cx)
            },
            contract_test! {
                id: "park-002",
                name: "Timed park elapses",
                description: "park_timeout without a permit eventually waits out its whole bound",
                category: TestCategory::LockSupport,
                tags: ["timeout"],
                expected: "a park_timeout lasting at least the timeout, then termination",
                bound: Descriptor,
                test: |imp, cx| timed_park_elapses(cx)
            },
            contract_test! {
                id: "park-003",
                name: "Unpark releases a parked thread",
                description: "A thread parked indefinitely is released by unpark",
                category: TestCategory::LockSupport,
                tags: ["liveness"],
                expected: "the parked thread terminates within the bound",
                bound: Descriptor,
                test: |imp, cx| unpark_releases_parked_thread(cx)
            },
            contract_test! {
                id: "park-004",
                name: "Permits do not accumulate",
                description: "Several unparks grant a single permit",
                category: TestCategory::LockSupport,
                tags: ["permit"],
                expected: "after one park consumes the permit, a timed park can wait its full bound",
                bound: Descriptor,
                test: |imp, cx| permits_do_not_accumulate(cx)
            },
        ],
    )
}

fn unpark_before_park(cx: &TestCx) -> TestOutcome {
    let bound = cx.long_delay();
    let thread = cx.spawn("self-unparker", move |_| {
        thread::current().unpark();
        let start = Instant::now();
        thread::park_timeout(bound);
        ensure!(start.elapsed() < bound, "park ignored the available permit");
        Ok(())
    });
    cx.await_termination(thread)
}

/// Parks until one `park_timeout(timeout)` lasts its full bound.
fn park_until_full_timeout(timeout: Duration, deadline: Instant) -> TestOutcome {
    loop {
        let start = Instant::now();
        thread::park_timeout(timeout);
        if start.elapsed() >= timeout {
            return Ok(());
        }
        ensure!(Instant::now() < deadline, "every park_timeout returned early");
    }
}

fn timed_park_elapses(cx: &TestCx) -> TestOutcome {
    let timeout = cx.delays().timeout;
    let deadline = Instant::now() + cx.long_delay();
    let thread = cx.spawn("timed-parker", move |_| park_until_full_timeout(timeout, deadline));
    cx.await_termination(thread)
}

fn unpark_releases_parked_thread(cx: &TestCx) -> TestOutcome {
    let parked: Arc<OnceLock<Thread>> = Arc::new(OnceLock::new());
    let released = Arc::new(AtomicBool::new(false));
    let started = Arc::new(CountDownLatch::new(1));

    let thread = {
        let parked = Arc::clone(&parked);
        let released = Arc::clone(&released);
        let started = Arc::clone(&started);
        cx.spawn("parker", move |_| {
            let _ = parked.set(thread::current());
            started.count_down();
            while !released.load(Ordering::Acquire) {
                thread::park();
            }
            Ok(())
        })
    };

    cx.await_latch(&started)?;
    thread::sleep(cx.delays().short);
    released.store(true, Ordering::Release);
    match parked.get() {
        Some(handle) => handle.unpark(),
        None => fail!("parker did not publish its handle"),
    }
    cx.await_termination(thread)
}

fn permits_do_not_accumulate(cx: &TestCx) -> TestOutcome {
    let timeout = cx.delays().timeout;
    let bound = cx.long_delay();
    let thread = cx.spawn("permit-counter", move |_| {
        let me = thread::current();
        me.unpark();
        me.unpark();
        me.unpark();

        let start = Instant::now();
        thread::park_timeout(bound);
        ensure!(start.elapsed() < bound, "park ignored the available permit");

        // a second permit would make this return immediately on every attempt
        park_until_full_timeout(timeout, Instant::now() + bound)
    });
    cx.await_termination(thread)
}
