//! Blocking queue contract (`bq-*`).
//!
//! Most tests start one or two auxiliary threads and are skipped for a queue
//! that is not declared concurrent. The main thread always waits on a
//! [`CountDownLatch`] for the helper to reach its blocking call before acting
//! on it, and every helper is awaited with a bounded wait, so a queue that
//! never releases a waiter fails with a liveness failure. A helper that stays
//! blocked after being interrupted is a cancellation failure instead.
//!
//! Interrupts are sticky: a helper interrupted before it actually parks still
//! observes the interrupt on entry to its blocking call. The short pause
//! before interrupting only makes the "already blocked" path the common one.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::context::TestCx;
use crate::descriptor::{BlockingQueueImplementation, BlockingQueueUnderTest};
use crate::element::{Element, SIZE, item_for, seq_items};
use crate::error::{ContainerError, Failure, TestOutcome};
use crate::registry::{Contract, ContractTest, TestCategory};
use crate::sync::{CountDownLatch, Interrupt};

use super::{await_interrupted, shared_across_threads};

/// Suite name of the blocking queue contract.
pub const SUITE: &str = "blocking_queue";

/// The blocking queue contract, instantiated for `D`.
pub fn contract<D: BlockingQueueImplementation>() -> Contract<D> {
    Contract::new(SUITE, collect_tests())
}

/// Every blocking queue test, in execution order.
pub fn collect_tests<D: BlockingQueueImplementation>() -> Vec<ContractTest<D>> {
    vec![
        contract_test! {
            id: "bq-001",
            name: "Fresh queue is empty",
            description: "A new queue holds nothing and reports its full capacity as remaining",
            category: TestCategory::BlockingQueue,
            tags: ["basic", "factory"],
            expected: "len 0, poll None, remaining capacity equals capacity",
            bound: BlockingQueueImplementation,
            test: |imp, cx| fresh_queue_is_empty(imp, cx)
        },
        contract_test! {
            id: "bq-002",
            name: "Null rejection",
            description: "offer, timed offer and put all reject null",
            category: TestCategory::BlockingQueue,
            tags: ["null"],
            expected: "NullElement from every insertion; queue unchanged",
            bound: BlockingQueueImplementation,
            test: |imp, cx| null_rejected(imp, cx)
        },
        contract_test! {
            id: "bq-003",
            name: "Offer and poll up to capacity",
            description: "offer succeeds until the queue is full; poll returns elements in FIFO order",
            category: TestCategory::BlockingQueue,
            tags: ["basic", "capacity", "ordering"],
            expected: "offer returns false when full or when no taker is waiting",
            bound: BlockingQueueImplementation,
            test: |imp, cx| offer_poll_to_capacity(imp, cx)
        },
        contract_test! {
            id: "bq-004",
            name: "Timed poll times out",
            description: "poll_timeout on an empty queue waits at least the requested bound",
            category: TestCategory::BlockingQueue,
            tags: ["timeout"],
            expected: "Ok(None) after at least the timeout",
            bound: BlockingQueueImplementation,
            test: |imp, cx| timed_poll_times_out(imp, cx)
        },
        contract_test! {
            id: "bq-005",
            name: "Blocked take released by insertion",
            description: "A thread blocked in take on an empty queue is released by a concurrent insertion",
            category: TestCategory::BlockingQueue,
            tags: ["blocking", "liveness"],
            expected: "take returns exactly the inserted element and the thread terminates",
            bound: BlockingQueueImplementation,
            test: |imp, cx| blocked_take_released_by_insertion(imp, cx)
        },
        contract_test! {
            id: "bq-006",
            name: "Blocked take interrupted",
            description: "Interrupting a thread blocked in take makes take report Interrupted",
            category: TestCategory::BlockingQueue,
            tags: ["blocking", "cancellation"],
            expected: "Interrupted, no residual interrupt, prompt termination",
            bound: BlockingQueueImplementation,
            test: |imp, cx| blocked_take_interrupted(imp, cx)
        },
        contract_test! {
            id: "bq-007",
            name: "Pre-interrupted waits",
            description: "take and poll_timeout fail immediately when an interrupt is already pending",
            category: TestCategory::BlockingQueue,
            tags: ["cancellation"],
            expected: "Interrupted without consuming an element; the interrupt is cleared",
            bound: BlockingQueueImplementation,
            test: |imp, cx| pre_interrupted_waits(imp, cx)
        },
        contract_test! {
            id: "bq-008",
            name: "Blocked put interrupted",
            description: "Interrupting a thread blocked in put on a full queue makes put report Interrupted",
            category: TestCategory::BlockingQueue,
            tags: ["blocking", "cancellation", "bounded"],
            expected: "Interrupted, queue still holds exactly its capacity",
            bound: BlockingQueueImplementation,
            test: |imp, cx| blocked_put_interrupted(imp, cx)
        },
        contract_test! {
            id: "bq-009",
            name: "Timed offer times out",
            description: "offer_timeout on a full queue waits at least the requested bound",
            category: TestCategory::BlockingQueue,
            tags: ["timeout", "bounded"],
            expected: "Ok(false) after at least the timeout",
            bound: BlockingQueueImplementation,
            test: |imp, cx| timed_offer_times_out(imp, cx)
        },
        contract_test! {
            id: "bq-010",
            name: "Blocked put released by take",
            description: "A thread blocked in put on a full queue is released when space is made",
            category: TestCategory::BlockingQueue,
            tags: ["blocking", "liveness", "bounded"],
            expected: "put completes and its element is queued last",
            bound: BlockingQueueImplementation,
            test: |imp, cx| blocked_put_released_by_take(imp, cx)
        },
        contract_test! {
            id: "bq-011",
            name: "Drain",
            description: "drain_to moves at most the requested number of elements in FIFO order",
            category: TestCategory::BlockingQueue,
            tags: ["bulk"],
            expected: "bounded transfer, FIFO order, empty queue afterwards",
            bound: BlockingQueueImplementation,
            test: |imp, cx| drain_respects_bound(imp, cx)
        },
        contract_test! {
            id: "bq-012",
            name: "Remaining capacity",
            description: "remaining_capacity tracks the number of queued elements",
            category: TestCategory::BlockingQueue,
            tags: ["capacity"],
            expected: "capacity - len for bounded queues, None for unbounded",
            bound: BlockingQueueImplementation,
            test: |imp, cx| remaining_capacity_tracks_len(imp, cx)
        },
        contract_test! {
            id: "bq-013",
            name: "Producer and consumer",
            description: "A producer putting SIZE elements and a consumer taking them both terminate",
            category: TestCategory::BlockingQueue,
            tags: ["blocking", "liveness", "ordering"],
            expected: "consumer sees 0..SIZE in order; both threads terminate",
            bound: BlockingQueueImplementation,
            test: |imp, cx| producer_consumer(imp, cx)
        },
    ]
}

/// Elements that fit without blocking, capped at `SIZE`.
fn fill_count<D: BlockingQueueImplementation>(imp: &D) -> usize {
    imp.capacity().map_or(SIZE, |c| c.min(SIZE))
}

fn fill<Q, E>(queue: &Q, elements: &[E]) -> TestOutcome
where
    Q: BlockingQueueUnderTest<E>,
    E: Element,
{
    for element in elements {
        ensure_matches!(queue.offer(Some(element.clone())), Ok(true));
    }
    Ok(())
}

/// Returns the capacity, or marks the test skipped for unbounded queues.
fn bounded_capacity<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> Option<usize> {
    let capacity = imp.capacity();
    if capacity.is_none() {
        cx.skip("unbounded queue never blocks an insertion");
    }
    capacity
}

fn fresh_queue_is_empty<D: BlockingQueueImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    ensure!(queue.is_empty());
    ensure_eq!(queue.len(), 0);
    ensure_eq!(queue.poll(), None);
    ensure_eq!(queue.remaining_capacity(), imp.capacity());

    let interrupt = Interrupt::current();
    ensure_eq!(queue.poll_timeout(Duration::ZERO, &interrupt), Ok(None));

    if fill_count(imp) > 0 {
        ensure_matches!(queue.offer(Some(item_for(1))), Ok(true));
        ensure!(imp.empty_queue().is_empty(), "a new queue observed another queue's element");
    }
    Ok(())
}

fn null_rejected<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    let interrupt = Interrupt::current();
    let kept = fill_count(imp).min(1);
    fill(&queue, &seq_items::<D::Elem>(kept))?;

    ensure_matches!(queue.offer(None), Err(ContainerError::NullElement));
    ensure_matches!(
        queue.offer_timeout(None, cx.delays().short, &interrupt),
        Err(ContainerError::NullElement)
    );
    ensure_matches!(queue.put(None, &interrupt), Err(ContainerError::NullElement));
    ensure_eq!(queue.len(), kept);
    if kept > 0 {
        ensure_eq!(queue.poll(), Some(item_for(0)));
    }
    ensure_eq!(queue.poll(), None);
    Ok(())
}

fn offer_poll_to_capacity<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    let count = fill_count(imp);
    let elements: Vec<D::Elem> = seq_items(count);
    fill(&queue, &elements)?;
    ensure_eq!(queue.len(), count);

    if imp.capacity().is_some() {
        cx.log().debug(format!("queue full at {count}"));
        ensure_matches!(queue.offer(Some(item_for(-1))), Ok(false));
        ensure_eq!(queue.len(), count);
        ensure_eq!(queue.remaining_capacity(), Some(0));
    }

    for expected in &elements {
        match queue.poll() {
            Some(element) => ensure!(element.is_same(expected), "polled {element}, expected {expected}"),
            None => fail!("queue ran dry before {expected}"),
        }
    }
    ensure_eq!(queue.poll(), None);
    Ok(())
}

fn timed_poll_times_out<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    let interrupt = Interrupt::current();
    let timeout = cx.delays().timeout;

    let start = Instant::now();
    ensure_eq!(queue.poll_timeout(timeout, &interrupt), Ok(None));
    let elapsed = start.elapsed();
    ensure!(
        elapsed >= timeout,
        "poll_timeout returned after {elapsed:?}, before its {timeout:?} bound"
    );
    ensure!(elapsed < cx.long_delay(), "poll_timeout overslept: {elapsed:?}");
    Ok(())
}

fn blocked_take_released_by_insertion<D: BlockingQueueImplementation>(
    imp: &D,
    cx: &TestCx,
) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let queue = Arc::new(imp.empty_queue());
    let started = Arc::new(CountDownLatch::new(1));
    let element: D::Elem = item_for(SIZE as i32 + 1);

    let taker = {
        let queue = Arc::clone(&queue);
        let started = Arc::clone(&started);
        let expected = element.clone();
        cx.spawn("taker", move |interrupt| {
            started.count_down();
            match queue.take(interrupt) {
                Ok(taken) => {
                    ensure!(taken.is_same(&expected), "took {taken}, expected {expected}");
                    Ok(())
                }
                Err(err) => fail!("take failed: {err}"),
            }
        })
    };

    cx.await_latch(&started)?;
    cx.log().debug("taker started; inserting");
    let interrupt = Interrupt::current();
    ensure_matches!(
        queue.offer_timeout(Some(element), cx.long_delay(), &interrupt),
        Ok(true)
    );
    cx.await_termination(taker)?;
    ensure!(queue.is_empty());
    Ok(())
}

fn blocked_take_interrupted<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let queue = Arc::new(imp.empty_queue());
    let started = Arc::new(CountDownLatch::new(1));

    let taker = {
        let queue = Arc::clone(&queue);
        let started = Arc::clone(&started);
        cx.spawn("interrupted-taker", move |interrupt| {
            started.count_down();
            match queue.take(interrupt) {
                Err(ContainerError::Interrupted) => {}
                Ok(taken) => {
                    return Err(Failure::cancellation(format!(
                        "take returned {taken} instead of reporting the interrupt"
                    )));
                }
                Err(err) => fail!("take failed with {err}"),
            }
            if interrupt.is_interrupted() {
                return Err(Failure::cancellation(
                    "take reported the interrupt but left it pending",
                ));
            }
            Ok(())
        })
    };

    cx.await_latch(&started)?;
    thread::sleep(cx.delays().short);
    taker.interrupt();
    await_interrupted(cx, taker, "take")?;
    ensure!(queue.is_empty());
    Ok(())
}

fn pre_interrupted_waits<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    let count = fill_count(imp).min(2);
    fill(&queue, &seq_items::<D::Elem>(count))?;
    let interrupt = Interrupt::current();

    interrupt.interrupt();
    let start = Instant::now();
    if queue.take(&interrupt) != Err(ContainerError::Interrupted) {
        return Err(Failure::cancellation("take ignored a pending interrupt"));
    }
    ensure!(!interrupt.is_interrupted(), "take left the interrupt pending");

    interrupt.interrupt();
    if queue.poll_timeout(cx.long_delay(), &interrupt) != Err(ContainerError::Interrupted) {
        return Err(Failure::cancellation("poll_timeout ignored a pending interrupt"));
    }
    ensure!(!interrupt.is_interrupted(), "poll_timeout left the interrupt pending");
    ensure!(start.elapsed() < cx.long_delay(), "pre-interrupted waits blocked");

    ensure_eq!(queue.len(), count, "an interrupted wait consumed an element");
    if count > 0 {
        ensure_eq!(queue.take(&interrupt), Ok(item_for(0)));
    }
    Ok(())
}

fn blocked_put_interrupted<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let Some(capacity) = bounded_capacity(imp, cx) else {
        return Ok(());
    };
    let queue = Arc::new(imp.empty_queue());
    let started = Arc::new(CountDownLatch::new(1));

    let putter = {
        let queue = Arc::clone(&queue);
        let started = Arc::clone(&started);
        cx.spawn("interrupted-putter", move |interrupt| {
            fill(queue.as_ref(), &seq_items::<D::Elem>(capacity))?;
            started.count_down();
            match queue.put(Some(item_for(-1)), interrupt) {
                Err(ContainerError::Interrupted) => {}
                Ok(()) => {
                    return Err(Failure::cancellation(
                        "put completed on a full queue instead of reporting the interrupt",
                    ));
                }
                Err(err) => fail!("put failed with {err}"),
            }
            if interrupt.is_interrupted() {
                return Err(Failure::cancellation(
                    "put reported the interrupt but left it pending",
                ));
            }
            Ok(())
        })
    };

    cx.await_latch(&started)?;
    thread::sleep(cx.delays().short);
    putter.interrupt();
    await_interrupted(cx, putter, "put")?;
    ensure_eq!(queue.len(), capacity);
    ensure_eq!(queue.remaining_capacity(), Some(0));
    Ok(())
}

fn timed_offer_times_out<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let Some(capacity) = bounded_capacity(imp, cx) else {
        return Ok(());
    };
    let queue = imp.empty_queue();
    fill(&queue, &seq_items::<D::Elem>(capacity))?;
    let interrupt = Interrupt::current();
    let timeout = cx.delays().timeout;

    let start = Instant::now();
    ensure_eq!(queue.offer_timeout(Some(item_for(-1)), timeout, &interrupt), Ok(false));
    let elapsed = start.elapsed();
    ensure!(
        elapsed >= timeout,
        "offer_timeout returned after {elapsed:?}, before its {timeout:?} bound"
    );
    ensure_eq!(queue.len(), capacity);
    Ok(())
}

fn blocked_put_released_by_take<D: BlockingQueueImplementation>(
    imp: &D,
    cx: &TestCx,
) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let Some(capacity) = bounded_capacity(imp, cx) else {
        return Ok(());
    };
    let queue = Arc::new(imp.empty_queue());
    let elements: Vec<D::Elem> = seq_items(capacity);
    fill(queue.as_ref(), &elements)?;
    let started = Arc::new(CountDownLatch::new(1));
    let last: D::Elem = item_for(-1);

    let putter = {
        let queue = Arc::clone(&queue);
        let started = Arc::clone(&started);
        let last = last.clone();
        cx.spawn("putter", move |interrupt| {
            started.count_down();
            match queue.put(Some(last), interrupt) {
                Ok(()) => Ok(()),
                Err(err) => fail!("put failed: {err}"),
            }
        })
    };

    cx.await_latch(&started)?;
    let interrupt = Interrupt::current();
    let head = match queue.poll_timeout(cx.long_delay(), &interrupt) {
        Ok(Some(head)) => head,
        other => fail!("poll_timeout returned {other:?} with a putter waiting"),
    };
    cx.await_termination(putter)?;

    let mut expected = elements;
    expected.push(last);
    ensure!(head.is_same(&expected[0]), "first element taken was {head}");
    for want in &expected[1..] {
        ensure_eq!(queue.poll().as_ref(), Some(want));
    }
    ensure!(queue.is_empty());
    Ok(())
}

fn drain_respects_bound<D: BlockingQueueImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let queue = imp.empty_queue();
    let count = fill_count(imp);
    let elements: Vec<D::Elem> = seq_items(count);
    fill(&queue, &elements)?;

    let mut sink = Vec::new();
    ensure_eq!(queue.drain_to(&mut sink, 0), 0);
    ensure!(sink.is_empty());

    let first = count.min(2);
    ensure_eq!(queue.drain_to(&mut sink, 2), first);
    ensure_eq!(queue.len(), count - first);
    ensure_eq!(queue.drain_to(&mut sink, usize::MAX), count - first);
    ensure_eq!(sink, elements, "drained elements out of FIFO order");
    ensure!(queue.is_empty());
    ensure_eq!(queue.drain_to(&mut sink, usize::MAX), 0);
    Ok(())
}

fn remaining_capacity_tracks_len<D: BlockingQueueImplementation>(
    imp: &D,
    _cx: &TestCx,
) -> TestOutcome {
    let queue = imp.empty_queue();
    let Some(capacity) = imp.capacity() else {
        ensure_eq!(queue.remaining_capacity(), None);
        fill(&queue, &seq_items::<D::Elem>(SIZE))?;
        ensure_eq!(queue.remaining_capacity(), None);
        return Ok(());
    };

    let count = fill_count(imp);
    for (i, element) in seq_items::<D::Elem>(count).into_iter().enumerate() {
        ensure_eq!(queue.remaining_capacity(), Some(capacity - i));
        ensure_matches!(queue.offer(Some(element)), Ok(true));
    }
    ensure_eq!(queue.remaining_capacity(), Some(capacity - count));
    for i in 0..count {
        ensure!(queue.poll().is_some());
        ensure_eq!(queue.remaining_capacity(), Some(capacity - count + i + 1));
    }
    Ok(())
}

fn producer_consumer<D: BlockingQueueImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let queue = Arc::new(imp.empty_queue());

    let consumer = {
        let queue = Arc::clone(&queue);
        cx.spawn("consumer", move |interrupt| {
            for expected in seq_items::<D::Elem>(SIZE) {
                match queue.take(interrupt) {
                    Ok(taken) => ensure_eq!(taken, expected, "consumer saw elements out of order"),
                    Err(err) => fail!("take failed: {err}"),
                }
            }
            Ok(())
        })
    };
    let producer = {
        let queue = Arc::clone(&queue);
        cx.spawn("producer", move |interrupt| {
            for element in seq_items::<D::Elem>(SIZE) {
                if let Err(err) = queue.put(Some(element), interrupt) {
                    fail!("put failed: {err}");
                }
            }
            Ok(())
        })
    };

    cx.await_termination(producer)?;
    cx.await_termination(consumer)?;
    ensure!(queue.is_empty());
    Ok(())
}
