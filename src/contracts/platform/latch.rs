//! Count-down latches (`latch-*`).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::context::TestCx;
use crate::contracts::{await_interrupted, shared_across_threads};
use crate::descriptor::{LatchImplementation, LatchUnderTest};
use crate::error::{ContainerError, Failure, TestOutcome};
use crate::registry::{Contract, TestCategory};
use crate::sync::{CountDownLatch, Interrupt};

/// Suite name of the latch contract.
pub const SUITE: &str = "latch";

const WAITERS: usize = 3;

/// The latch contract.
pub fn contract<D: LatchImplementation>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "latch-001",
                name: "Count down to zero",
                description: "The count drops by one per count_down and stops at zero",
                category: TestCategory::Latch,
                tags: ["basic"],
                expected: "count 3, 2, 1, 0, 0; an open latch never blocks",
                bound: LatchImplementation,
                test: |imp, cx| count_down_to_zero(imp, cx)
            },
            contract_test! {
                id: "latch-002",
                name: "Timed wait times out",
                description: "wait_timeout on a closed latch waits at least the requested bound",
                category: TestCategory::Latch,
                tags: ["timeout"],
                expected: "Ok(false) after at least the timeout; count unchanged",
                bound: LatchImplementation,
                test: |imp, cx| timed_wait_times_out(imp, cx)
            },
            contract_test! {
                id: "latch-003",
                name: "Waiters released together",
                description: "Threads waiting on the latch stay blocked until the last count_down",
                category: TestCategory::Latch,
                tags: ["blocking", "liveness"],
                expected: "no waiter passes early; every waiter terminates after the final count_down",
                bound: LatchImplementation,
                test: |imp, cx| waiters_released_together(imp, cx)
            },
            contract_test! {
                id: "latch-004",
                name: "Blocked wait interrupted",
                description: "Interrupting a thread blocked in wait makes wait report Interrupted",
                category: TestCategory::Latch,
                tags: ["blocking", "cancellation"],
                expected: "Interrupted, interrupt consumed, count unchanged",
                bound: LatchImplementation,
                test: |imp, cx| blocked_wait_interrupted(imp, cx)
            },
            contract_test! {
                id: "latch-005",
                name: "Pre-interrupted wait",
                description: "wait_timeout fails at once when an interrupt is already pending",
                category: TestCategory::Latch,
                tags: ["cancellation"],
                expected: "Interrupted well before the timeout; the interrupt is cleared",
                bound: LatchImplementation,
                test: |imp, cx| pre_interrupted_wait(imp, cx)
            },
        ],
    )
}

fn count_down_to_zero<D: LatchImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let latch = imp.latch(3);
    let interrupt = Interrupt::current();
    ensure_eq!(latch.count(), 3);
    ensure_eq!(latch.wait_timeout(Duration::ZERO, &interrupt), Ok(false));

    for expected in [2, 1, 0] {
        latch.count_down();
        ensure_eq!(latch.count(), expected);
    }
    latch.count_down();
    ensure_eq!(latch.count(), 0, "count_down went below zero");

    let start = Instant::now();
    ensure_eq!(latch.wait_timeout(cx.long_delay(), &interrupt), Ok(true));
    ensure_eq!(latch.wait(&interrupt), Ok(()));
    ensure!(start.elapsed() < cx.long_delay(), "an open latch blocked");

    ensure_eq!(imp.latch(0).wait_timeout(Duration::ZERO, &interrupt), Ok(true));
    Ok(())
}

fn timed_wait_times_out<D: LatchImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let latch = imp.latch(1);
    let interrupt = Interrupt::current();
    let timeout = cx.delays().timeout;

    let start = Instant::now();
    ensure_eq!(latch.wait_timeout(timeout, &interrupt), Ok(false));
    let elapsed = start.elapsed();
    ensure!(
        elapsed >= timeout,
        "wait_timeout returned after {elapsed:?}, before its {timeout:?} bound"
    );
    ensure_eq!(latch.count(), 1);
    Ok(())
}

fn waiters_released_together<D: LatchImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let latch = Arc::new(imp.latch(2));
    let started = Arc::new(CountDownLatch::new(WAITERS));
    let passed = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..WAITERS)
        .map(|w| {
            let latch = Arc::clone(&latch);
            let started = Arc::clone(&started);
            let passed = Arc::clone(&passed);
            cx.spawn(&format!("latch-waiter-{w}"), move |interrupt| {
                started.count_down();
                if let Err(err) = latch.wait(interrupt) {
                    fail!("wait failed: {err}");
                }
                passed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    cx.await_latch(&started)?;
    latch.count_down();
    thread::sleep(cx.delays().short);
    ensure_eq!(passed.load(Ordering::SeqCst), 0, "a waiter passed before the count reached zero");

    cx.log().debug("final count_down");
    latch.count_down();
    for waiter in waiters {
        cx.await_termination(waiter)?;
    }
    ensure_eq!(passed.load(Ordering::SeqCst), WAITERS);
    Ok(())
}

fn blocked_wait_interrupted<D: LatchImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let latch = Arc::new(imp.latch(1));
    let started = Arc::new(CountDownLatch::new(1));

    let waiter = {
        let latch = Arc::clone(&latch);
        let started = Arc::clone(&started);
        cx.spawn("interrupted-waiter", move |interrupt| {
            started.count_down();
            match latch.wait(interrupt) {
                Err(ContainerError::Interrupted) => {}
                Ok(()) => {
                    return Err(Failure::cancellation(
                        "wait returned on a closed latch instead of reporting the interrupt",
                    ));
                }
                Err(err) => fail!("wait failed with {err}"),
            }
            if interrupt.is_interrupted() {
                return Err(Failure::cancellation(
                    "wait reported the interrupt but left it pending",
                ));
            }
            Ok(())
        })
    };

    cx.await_latch(&started)?;
    thread::sleep(cx.delays().short);
    waiter.interrupt();
    await_interrupted(cx, waiter, "wait")?;
    ensure_eq!(latch.count(), 1);
    Ok(())
}

fn pre_interrupted_wait<D: LatchImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let latch = imp.latch(1);
    let interrupt = Interrupt::current();

    interrupt.interrupt();
    let start = Instant::now();
    if latch.wait_timeout(cx.long_delay(), &interrupt) != Err(ContainerError::Interrupted) {
        return Err(Failure::cancellation("wait_timeout ignored a pending interrupt"));
    }
    ensure!(start.elapsed() < cx.long_delay(), "pre-interrupted wait blocked");
    ensure!(!interrupt.is_interrupted(), "wait_timeout left the interrupt pending");
    ensure_eq!(latch.count(), 1);
    Ok(())
}
