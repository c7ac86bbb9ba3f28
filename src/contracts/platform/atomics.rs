//! Atomic variables (`atom-*`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicUsize, Ordering};

use crate::context::TestCx;
use crate::descriptor::Descriptor;
use crate::error::TestOutcome;
use crate::registry::{Contract, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the atomics contract.
pub const SUITE: &str = "atomics";

const LOAD_ORDERINGS: [Ordering; 3] = [Ordering::Relaxed, Ordering::Acquire, Ordering::SeqCst];
const STORE_ORDERINGS: [Ordering; 3] = [Ordering::Relaxed, Ordering::Release, Ordering::SeqCst];
const RMW_ORDERINGS: [Ordering; 5] = [
    Ordering::Relaxed,
    Ordering::Acquire,
    Ordering::Release,
    Ordering::AcqRel,
    Ordering::SeqCst,
];

/// The atomics contract.
pub fn contract<D: Descriptor>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "atom-001",
                name: "Read-modify-write results",
                description: "fetch_* return the previous value and store the new one",
                category: TestCategory::Atomics,
                tags: ["rmw"],
                expected: "previous values returned, new values visible",
                bound: Descriptor,
                test: |imp, cx| read_modify_write(cx)
            },
            contract_test! {
                id: "atom-002",
                name: "Every ordering",
                description: "Loads, stores, swaps and compare-exchanges agree under every valid ordering",
                category: TestCategory::Atomics,
                tags: ["ordering"],
                expected: "identical single-threaded results for every ordering combination",
                bound: Descriptor,
                test: |imp, cx| every_ordering(cx)
            },
            contract_test! {
                id: "atom-003",
                name: "Contended increments",
                description: "Concurrent fetch_add from several threads loses no update",
                category: TestCategory::Atomics,
                tags: ["concurrency", "rmw"],
                expected: "final count equals the number of increments",
                bound: Descriptor,
                test: |imp, cx| contended_increments(cx)
            },
            contract_test! {
                id: "atom-004",
                name: "Bit operations",
                description: "fetch_and, fetch_or, fetch_xor and fetch_nand on booleans and integers",
                category: TestCategory::Atomics,
                tags: ["bits"],
                expected: "truth tables hold",
                bound: Descriptor,
                test: |imp, cx| bit_operations(cx)
            },
            contract_test! {
                id: "atom-005",
                name: "Max and min",
                description: "fetch_max and fetch_min keep the extreme value",
                category: TestCategory::Atomics,
                tags: ["rmw"],
                expected: "previous value returned, extreme stored",
                bound: Descriptor,
                test: |imp, cx| max_and_min(cx)
            },
            contract_test! {
                id: "atom-006",
                name: "fetch_update",
                description: "fetch_update applies the function or leaves the value when it declines",
                category: TestCategory::Atomics,
                tags: ["rmw", "cas"],
                expected: "Ok(previous) when applied, Err(current) when declined",
                bound: Descriptor,
                test: |imp, cx| fetch_update(cx)
            },
        ],
    )
}

fn read_modify_write(_cx: &TestCx) -> TestOutcome {
    let value = AtomicI32::new(1);
    ensure_eq!(value.fetch_add(2, Ordering::SeqCst), 1);
    ensure_eq!(value.load(Ordering::SeqCst), 3);
    ensure_eq!(value.fetch_sub(5, Ordering::SeqCst), 3);
    ensure_eq!(value.load(Ordering::SeqCst), -2);
    ensure_eq!(value.swap(7, Ordering::SeqCst), -2);
    ensure_eq!(value.compare_exchange(7, 8, Ordering::SeqCst, Ordering::SeqCst), Ok(7));
    ensure_eq!(value.compare_exchange(7, 9, Ordering::SeqCst, Ordering::SeqCst), Err(8));
    ensure_eq!(value.load(Ordering::SeqCst), 8);

    // wrapping is defined for atomics
    let wide = AtomicI64::new(i64::MAX);
    ensure_eq!(wide.fetch_add(1, Ordering::SeqCst), i64::MAX);
    ensure_eq!(wide.load(Ordering::SeqCst), i64::MIN);

    let mut owned = AtomicUsize::new(4);
    *owned.get_mut() += 1;
    ensure_eq!(owned.into_inner(), 5);
    Ok(())
}

fn every_ordering(cx: &TestCx) -> TestOutcome {
    let value = AtomicI32::new(0);
    for store in STORE_ORDERINGS {
        for load in LOAD_ORDERINGS {
            value.store(3, store);
            ensure_eq!(value.load(load), 3, "store {store:?} / load {load:?}");
        }
    }

    for rmw in RMW_ORDERINGS {
        value.store(1, Ordering::SeqCst);
        ensure_eq!(value.swap(2, rmw), 1, "swap {rmw:?}");
        ensure_eq!(value.fetch_add(1, rmw), 2, "fetch_add {rmw:?}");
        for failure in LOAD_ORDERINGS {
            value.store(10, Ordering::SeqCst);
            ensure_eq!(value.compare_exchange(10, 11, rmw, failure), Ok(10));
            ensure_eq!(value.compare_exchange(10, 12, rmw, failure), Err(11));
            let mut current = value.load(Ordering::Relaxed);
            loop {
                match value.compare_exchange_weak(current, current + 1, rmw, failure) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                }
            }
            ensure_eq!(value.load(Ordering::SeqCst), 12);
        }
    }
    cx.log().debug(format!(
        "checked {} ordering combinations",
        STORE_ORDERINGS.len() * LOAD_ORDERINGS.len() + RMW_ORDERINGS.len() * LOAD_ORDERINGS.len()
    ));
    Ok(())
}

fn contended_increments(cx: &TestCx) -> TestOutcome {
    const THREADS: usize = 4;
    const INCREMENTS: usize = 10_000;

    let counter = Arc::new(AtomicUsize::new(0));
    let ready = Arc::new(CountDownLatch::new(THREADS));
    let bound = cx.long_delay();
    let threads: Vec<_> = (0..THREADS)
        .map(|t| {
            let counter = Arc::clone(&counter);
            let ready = Arc::clone(&ready);
            cx.spawn(&format!("incrementer-{t}"), move |_| {
                ready.count_down();
                ready.await_open(bound)?;
                for _ in 0..INCREMENTS {
                    counter.fetch_add(1, Ordering::AcqRel);
                }
                Ok(())
            })
        })
        .collect();
    for thread in threads {
        cx.await_termination(thread)?;
    }
    ensure_eq!(counter.load(Ordering::SeqCst), THREADS * INCREMENTS);
    Ok(())
}

fn bit_operations(_cx: &TestCx) -> TestOutcome {
    for a in [false, true] {
        for b in [false, true] {
            let flag = AtomicBool::new(a);
            ensure_eq!(flag.fetch_and(b, Ordering::SeqCst), a);
            ensure_eq!(flag.load(Ordering::SeqCst), a & b, "{a} & {b}");

            flag.store(a, Ordering::SeqCst);
            ensure_eq!(flag.fetch_or(b, Ordering::SeqCst), a);
            ensure_eq!(flag.load(Ordering::SeqCst), a | b, "{a} | {b}");

            flag.store(a, Ordering::SeqCst);
            ensure_eq!(flag.fetch_xor(b, Ordering::SeqCst), a);
            ensure_eq!(flag.load(Ordering::SeqCst), a ^ b, "{a} ^ {b}");

            flag.store(a, Ordering::SeqCst);
            ensure_eq!(flag.fetch_nand(b, Ordering::SeqCst), a);
            ensure_eq!(flag.load(Ordering::SeqCst), !(a & b), "!({a} & {b})");
        }
    }

    let bits = AtomicU32::new(0b1100);
    ensure_eq!(bits.fetch_and(0b1010, Ordering::SeqCst), 0b1100);
    ensure_eq!(bits.fetch_or(0b0001, Ordering::SeqCst), 0b1000);
    ensure_eq!(bits.fetch_xor(0b1111, Ordering::SeqCst), 0b1001);
    ensure_eq!(bits.fetch_nand(0b0110, Ordering::SeqCst), 0b0110);
    ensure_eq!(bits.load(Ordering::SeqCst), !0b0110);
    Ok(())
}

fn max_and_min(_cx: &TestCx) -> TestOutcome {
    let value = AtomicI32::new(5);
    ensure_eq!(value.fetch_max(3, Ordering::SeqCst), 5);
    ensure_eq!(value.load(Ordering::SeqCst), 5);
    ensure_eq!(value.fetch_max(9, Ordering::SeqCst), 5);
    ensure_eq!(value.fetch_min(-4, Ordering::SeqCst), 9);
    ensure_eq!(value.fetch_min(0, Ordering::SeqCst), -4);
    ensure_eq!(value.load(Ordering::SeqCst), -4);
    Ok(())
}

fn fetch_update(_cx: &TestCx) -> TestOutcome {
    let value = AtomicI32::new(10);
    ensure_eq!(
        value.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v * 2)),
        Ok(10)
    );
    ensure_eq!(value.load(Ordering::SeqCst), 20);
    ensure_eq!(
        value.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| (v < 0).then_some(0)),
        Err(20)
    );
    ensure_eq!(value.load(Ordering::SeqCst), 20);
    Ok(())
}
