//! Barriers (`bar-*`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::context::TestCx;
use crate::descriptor::Descriptor;
use crate::error::TestOutcome;
use crate::registry::{Contract, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the barrier contract.
pub const SUITE: &str = "barrier";

const PARTIES: usize = 4;

/// The barrier contract.
pub fn contract<D: Descriptor>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "bar-001",
                name: "One leader",
                description: "Exactly one party of a generation is told it is the leader",
                category: TestCategory::Barrier,
                tags: ["leader"],
                expected: "one leader among all parties",
                bound: Descriptor,
                test: |imp, cx| one_leader(cx)
            },
            contract_test! {
                id: "bar-002",
                name: "Reuse across generations",
                description: "A barrier trips again for each new generation of parties",
                category: TestCategory::Barrier,
                tags: ["generations"],
                expected: "one leader per generation, every party passes every generation",
                bound: Descriptor,
                test: |imp, cx| reuse_across_generations(cx)
            },
            contract_test! {
                id: "bar-003",
                name: "Nobody released early",
                description: "Parties stay blocked until the last one arrives",
                category: TestCategory::Barrier,
                tags: ["liveness"],
                expected: "no party passes before the last arrival; all pass after it",
                bound: Descriptor,
                test: |imp, cx| nobody_released_early(cx)
            },
        ],
    )
}

fn run_generations(cx: &TestCx, generations: usize) -> TestOutcome {
    let barrier = Arc::new(Barrier::new(PARTIES));
    let leaders = Arc::new(AtomicUsize::new(0));
    let passed = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..PARTIES)
        .map(|p| {
            let barrier = Arc::clone(&barrier);
            let leaders = Arc::clone(&leaders);
            let passed = Arc::clone(&passed);
            cx.spawn(&format!("party-{p}"), move |_| {
                for _ in 0..generations {
                    if barrier.wait().is_leader() {
                        leaders.fetch_add(1, Ordering::SeqCst);
                    }
                    passed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })
        })
        .collect();
    for thread in threads {
        cx.await_termination(thread)?;
    }

    ensure_eq!(leaders.load(Ordering::SeqCst), generations, "expected one leader per generation");
    ensure_eq!(passed.load(Ordering::SeqCst), PARTIES * generations);
    Ok(())
}

fn one_leader(cx: &TestCx) -> TestOutcome {
    run_generations(cx, 1)
}

fn reuse_across_generations(cx: &TestCx) -> TestOutcome {
    run_generations(cx, 3)
}

fn nobody_released_early(cx: &TestCx) -> TestOutcome {
    let barrier = Arc::new(Barrier::new(PARTIES));
    let passed = Arc::new(AtomicUsize::new(0));
    let arrived = Arc::new(CountDownLatch::new(PARTIES - 1));

    let threads: Vec<_> = (0..PARTIES - 1)
        .map(|p| {
            let barrier = Arc::clone(&barrier);
            let passed = Arc::clone(&passed);
            let arrived = Arc::clone(&arrived);
            cx.spawn(&format!("waiter-{p}"), move |_| {
                arrived.count_down();
                barrier.wait();
                passed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    cx.await_latch(&arrived)?;
    thread::sleep(cx.delays().short);
    ensure_eq!(passed.load(Ordering::SeqCst), 0, "a party passed before the last arrival");

    cx.log().debug("last party arriving");
    barrier.wait();
    for thread in threads {
        cx.await_termination(thread)?;
    }
    ensure_eq!(passed.load(Ordering::SeqCst), PARTIES - 1);
    Ok(())
}
