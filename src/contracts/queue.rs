//! Non-blocking queue contract (`queue-*`).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::context::TestCx;
use crate::descriptor::{QueueImplementation, QueueUnderTest};
use crate::element::{Element, SIZE, item_for, seq_items};
use crate::error::{ContainerError, Failure, TestOutcome};
use crate::registry::{Contract, ContractTest, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the queue contract.
pub const SUITE: &str = "queue";

const BACKOFF: Duration = Duration::from_micros(100);

/// The queue contract, instantiated for `D`.
pub fn contract<D: QueueImplementation>() -> Contract<D> {
    Contract::new(SUITE, collect_tests())
}

/// Every queue test, in execution order.
pub fn collect_tests<D: QueueImplementation>() -> Vec<ContractTest<D>> {
    vec![
        contract_test! {
            id: "queue-001",
            name: "Fresh queue is empty",
            description: "empty_queue returns a distinct, empty instance on every call",
            category: TestCategory::Queue,
            tags: ["basic", "factory"],
            expected: "poll returns None, len 0",
            bound: QueueImplementation,
            test: |imp, cx| fresh_queue_is_empty(imp, cx)
        },
        contract_test! {
            id: "queue-002",
            name: "FIFO order",
            description: "Elements are polled in the order they were offered",
            category: TestCategory::Queue,
            tags: ["basic", "ordering"],
            expected: "poll yields 0..SIZE in order, each the inserted object",
            bound: QueueImplementation,
            test: |imp, cx| fifo_order(imp, cx)
        },
        contract_test! {
            id: "queue-003",
            name: "Null rejection",
            description: "Offering null fails and leaves the queue unchanged",
            category: TestCategory::Queue,
            tags: ["null"],
            expected: "NullElement; same length and contents afterwards",
            bound: QueueImplementation,
            test: |imp, cx| null_rejected(imp, cx)
        },
        contract_test! {
            id: "queue-004",
            name: "Capacity",
            description: "Bounded queues refuse offers beyond capacity; unbounded ones accept SIZE",
            category: TestCategory::Queue,
            tags: ["capacity"],
            expected: "offer returns false exactly when full",
            bound: QueueImplementation,
            test: |imp, cx| capacity_respected(imp, cx)
        },
        contract_test! {
            id: "queue-005",
            name: "Peek",
            description: "peek returns the head without removing it, or reports Unsupported",
            category: TestCategory::Queue,
            tags: ["peek"],
            expected: "head unchanged after peek",
            bound: QueueImplementation,
            test: |imp, cx| peek_does_not_remove(imp, cx)
        },
        contract_test! {
            id: "queue-006",
            name: "Concurrent producers and consumers",
            description: "Elements offered by several producers are each polled exactly once",
            category: TestCategory::Queue,
            tags: ["concurrency"],
            expected: "no element lost or duplicated",
            bound: QueueImplementation,
            test: |imp, cx| concurrent_conservation(imp, cx)
        },
    ]
}

fn fresh_queue_is_empty<D: QueueImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let first = imp.empty_queue();
    let second = imp.empty_queue();
    ensure!(first.is_empty());
    ensure_eq!(first.len(), 0);
    ensure_eq!(first.poll(), None);
    if imp.capabilities().peek {
        ensure_eq!(first.peek(), Ok(None));
    }

    ensure_matches!(first.offer(Some(item_for(1))), Ok(true));
    ensure!(second.is_empty(), "second instance observed a mutation of the first");
    Ok(())
}

fn fifo_order<D: QueueImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    let count = queue.capacity().map_or(SIZE, |c| c.min(SIZE));
    let elements: Vec<D::Elem> = seq_items(count);
    for element in &elements {
        ensure_matches!(queue.offer(Some(element.clone())), Ok(true));
    }
    ensure_eq!(queue.len(), count);

    for (polled, expected) in elements.iter().enumerate() {
        match queue.poll() {
            Some(element) => {
                ensure_eq!(&element, expected);
                ensure!(element.is_same(expected), "{element} is not the offered object");
            }
            None => fail!("queue ran dry after {polled} of {count} elements"),
        }
    }
    ensure_eq!(queue.poll(), None);
    ensure!(queue.is_empty());
    Ok(())
}

fn null_rejected<D: QueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    ensure_matches!(queue.offer(Some(item_for(1))), Ok(true));
    ensure_matches!(queue.offer(Some(item_for(2))), Ok(true));

    if imp.capabilities().permits_null_keys {
        cx.skip("queue declares null elements permitted");
        return Ok(());
    }

    ensure_matches!(queue.offer(None), Err(ContainerError::NullElement));
    ensure_eq!(queue.len(), 2);
    ensure_eq!(queue.poll(), Some(item_for(1)));
    ensure_eq!(queue.poll(), Some(item_for(2)));
    ensure_eq!(queue.poll(), None);
    Ok(())
}

fn capacity_respected<D: QueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    match queue.capacity() {
        Some(capacity) => {
            cx.log().debug(format!("bounded queue, capacity {capacity}"));
            for i in 0..capacity as i32 {
                ensure_matches!(queue.offer(Some(item_for(i))), Ok(true));
            }
            ensure_eq!(queue.len(), capacity);
            ensure_matches!(queue.offer(Some(item_for(-1))), Ok(false));
            ensure_eq!(queue.len(), capacity);

            ensure_eq!(queue.poll(), Some(item_for(0)));
            ensure_matches!(queue.offer(Some(item_for(-1))), Ok(true));
            ensure_eq!(queue.len(), capacity);
        }
        None => {
            for i in 0..SIZE as i32 {
                ensure_matches!(queue.offer(Some(item_for(i))), Ok(true));
            }
            ensure_eq!(queue.len(), SIZE);
        }
    }
    Ok(())
}

fn peek_does_not_remove<D: QueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    ensure_matches!(queue.offer(Some(item_for(1))), Ok(true));
    ensure_matches!(queue.offer(Some(item_for(2))), Ok(true));

    if !imp.capabilities().peek {
        ensure_eq!(queue.peek(), Err(ContainerError::Unsupported));
        ensure_eq!(queue.len(), 2);
        cx.skip("peek not supported");
        return Ok(());
    }

    ensure_eq!(queue.peek(), Ok(Some(item_for(1))));
    ensure_eq!(queue.peek(), Ok(Some(item_for(1))));
    ensure_eq!(queue.len(), 2);
    ensure_eq!(queue.poll(), Some(item_for(1)));
    ensure_eq!(queue.peek(), Ok(Some(item_for(2))));
    ensure_eq!(queue.poll(), Some(item_for(2)));
    ensure_eq!(queue.peek(), Ok(None));
    Ok(())
}

fn concurrent_conservation<D: QueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    const PRODUCERS: i32 = 2;
    const CONSUMERS: usize = 2;
    const PER_PRODUCER: i32 = 500;
    const TOTAL: usize = PRODUCERS as usize * PER_PRODUCER as usize;

    if !imp.capabilities().concurrent {
        cx.skip("not declared concurrent");
        return Ok(());
    }

    let queue = Arc::new(imp.empty_queue());
    let consumed = Arc::new(Mutex::new(Vec::with_capacity(TOTAL)));
    let remaining = Arc::new(AtomicUsize::new(TOTAL));
    let started = Arc::new(CountDownLatch::new(CONSUMERS));
    let bound = cx.long_delay();

    let mut threads = Vec::new();
    for c in 0..CONSUMERS {
        let queue = Arc::clone(&queue);
        let consumed = Arc::clone(&consumed);
        let remaining = Arc::clone(&remaining);
        let started = Arc::clone(&started);
        threads.push(cx.spawn(&format!("consumer-{c}"), move |interrupt| {
            started.count_down();
            while remaining.load(Ordering::SeqCst) > 0 {
                match queue.poll() {
                    Some(element) => {
                        remaining.fetch_sub(1, Ordering::SeqCst);
                        consumed.lock().push(element.index());
                    }
                    None => interrupt
                        .park_timeout(BACKOFF)
                        .map_err(|_| Failure::cancellation("consumer interrupted"))?,
                }
            }
            Ok(())
        }));
    }
    cx.await_latch(&started)?;

    for p in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        threads.push(cx.spawn(&format!("producer-{p}"), move |interrupt| {
            for i in 0..PER_PRODUCER {
                let element: D::Elem = item_for(p * PER_PRODUCER + i);
                let deadline = Instant::now() + bound;
                loop {
                    match queue.offer(Some(element.clone())) {
                        Ok(true) => break,
                        Ok(false) if Instant::now() < deadline => {
                            interrupt
                                .park_timeout(BACKOFF)
                                .map_err(|_| Failure::cancellation("producer interrupted"))?;
                        }
                        other => fail!("offer({element}) returned {other:?}"),
                    }
                }
            }
            Ok(())
        }));
    }

    for thread in threads {
        cx.await_termination(thread)?;
    }

    let consumed = consumed.lock();
    ensure_eq!(consumed.len(), TOTAL, "elements lost or duplicated");
    let distinct: BTreeSet<i32> = consumed.iter().copied().collect();
    ensure_eq!(distinct.len(), TOTAL, "some element was polled twice");
    ensure!(queue.is_empty());
    Ok(())
}
