//! Spawned tasks (`task-*`): result delivery through `JoinHandle`, panics
//! surfacing as errors, completion tracking, scoped fork/join, completion
//! order through a channel and dependent stages.
//!
//! These run on raw `std::thread` handles rather than tracked auxiliary
//! threads, since the handle itself is what is under test. Every join is
//! preceded by a bounded wait on `is_finished`, so a task that never
//! completes is still a liveness failure rather than a hang.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::context::TestCx;
use crate::descriptor::Descriptor;
use crate::error::{Failure, TestOutcome, panic_message};
use crate::registry::{Contract, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the task contract.
pub const SUITE: &str = "tasks";

const WORKERS: usize = 4;

/// Leaf size of the fork/join sum.
const THRESHOLD: usize = 64;

/// The task contract.
pub fn contract<D: Descriptor>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "task-001",
                name: "Join delivers the result",
                description: "join on a finished task returns the value it computed",
                category: TestCategory::Tasks,
                tags: ["basic", "completion"],
                expected: "Ok(value) from join",
                bound: Descriptor,
                test: |imp, cx| join_delivers_result(cx)
            },
            contract_test! {
                id: "task-002",
                name: "Panic reported as error",
                description: "A task that panics completes exceptionally: join returns Err with the payload",
                category: TestCategory::Tasks,
                tags: ["completion", "exceptional"],
                expected: "Err carrying the panic message; other tasks unaffected",
                bound: Descriptor,
                test: |imp, cx| panic_reported_as_error(cx)
            },
            contract_test! {
                id: "task-003",
                name: "Completion is observable",
                description: "is_finished stays false while a task is blocked and turns true once it returns",
                category: TestCategory::Tasks,
                tags: ["completion", "liveness"],
                expected: "false before release, true after, then join succeeds",
                bound: Descriptor,
                test: |imp, cx| completion_is_observable(cx)
            },
            contract_test! {
                id: "task-004",
                name: "Scoped fork/join",
                description: "A recursive divide-and-conquer sum over borrowed data agrees with the sequential sum",
                category: TestCategory::Tasks,
                tags: ["fork_join"],
                expected: "equal sums; every forked task joined before the scope ends",
                bound: Descriptor,
                test: |imp, cx| scoped_fork_join(cx)
            },
            contract_test! {
                id: "task-005",
                name: "Results in completion order",
                description: "Workers reporting through a channel are received in the order they complete",
                category: TestCategory::Tasks,
                tags: ["completion", "ordering"],
                expected: "receive order equals release order; each result exactly once",
                bound: Descriptor,
                test: |imp, cx| results_in_completion_order(cx)
            },
            contract_test! {
                id: "task-006",
                name: "Dependent stages",
                description: "A stage fed by another stage sees its result, and a failed stage fails its dependents",
                category: TestCategory::Tasks,
                tags: ["completion", "chaining", "exceptional"],
                expected: "mapped value through a healthy chain; an error through a broken one",
                bound: Descriptor,
                test: |imp, cx| dependent_stages(cx)
            },
        ],
    )
}

/// Waits up to `bound` for `handle` to finish, then joins it.
fn join_within<T>(handle: JoinHandle<T>, bound: Duration) -> Result<thread::Result<T>, Failure> {
    let deadline = Instant::now() + bound;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(Failure::liveness("spawned task", bound));
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(handle.join())
}

fn join_delivers_result(cx: &TestCx) -> TestOutcome {
    let handle = thread::spawn(|| (1..=10_u64).product::<u64>());
    match join_within(handle, cx.long_delay())? {
        Ok(value) => ensure_eq!(value, 3_628_800),
        Err(payload) => fail!("task panicked: {}", panic_message(payload.as_ref())),
    }

    let unit = thread::spawn(|| ());
    ensure!(join_within(unit, cx.long_delay())?.is_ok());
    Ok(())
}

fn panic_reported_as_error(cx: &TestCx) -> TestOutcome {
    let failing = thread::Builder::new()
        .name("failing-task".into())
        .spawn(|| -> u32 { panic!("task failed on purpose") });
    let Ok(failing) = failing else {
        fail!("could not spawn the failing task");
    };
    let healthy = thread::spawn(|| 7_u32);

    match join_within(failing, cx.long_delay())? {
        Ok(value) => fail!("a panicking task completed normally with {value}"),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            ensure!(message.contains("on purpose"), "unexpected panic payload: {message}");
        }
    }
    match join_within(healthy, cx.long_delay())? {
        Ok(value) => ensure_eq!(value, 7),
        Err(_) => fail!("a sibling task was affected by another task's panic"),
    }
    Ok(())
}

fn completion_is_observable(cx: &TestCx) -> TestOutcome {
    let started = Arc::new(CountDownLatch::new(1));
    let release = Arc::new(CountDownLatch::new(1));
    let bound = cx.long_delay();

    let handle = {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            started.count_down();
            release.wait_timeout(bound)
        })
    };

    cx.await_latch(&started)?;
    thread::sleep(cx.delays().short);
    if handle.is_finished() {
        release.count_down();
        fail!("is_finished reported a blocked task as complete");
    }

    release.count_down();
    match join_within(handle, bound)? {
        Ok(released) => ensure!(released, "task timed out instead of being released"),
        Err(payload) => fail!("task panicked: {}", panic_message(payload.as_ref())),
    }
    Ok(())
}

/// Sums `values` by splitting it in halves, forking the left half.
///
/// `None` if any forked task panicked.
fn fork_join_sum(values: &[u64]) -> Option<u64> {
    if values.len() <= THRESHOLD {
        return Some(values.iter().sum());
    }
    let (left, right) = values.split_at(values.len() / 2);
    thread::scope(|scope| {
        let forked = scope.spawn(|| fork_join_sum(left));
        let right_sum = fork_join_sum(right);
        Some(forked.join().ok()?? + right_sum?)
    })
}

fn scoped_fork_join(cx: &TestCx) -> TestOutcome {
    let values: Vec<u64> = (0..1024).map(|i| i * 7 + 3).collect();
    let expected: u64 = values.iter().sum();

    let start = Instant::now();
    let actual = fork_join_sum(&values);
    cx.log().debug(format!("fork/join sum in {:?}", start.elapsed()));
    ensure_eq!(actual, Some(expected), "fork/join sum disagrees with the sequential sum");
    Ok(())
}

fn results_in_completion_order(cx: &TestCx) -> TestOutcome {
    let (tx, rx) = mpsc::channel();
    let gates: Vec<Arc<CountDownLatch>> =
        (0..WORKERS).map(|_| Arc::new(CountDownLatch::new(1))).collect();
    let bound = cx.long_delay();

    let handles: Vec<JoinHandle<()>> = gates
        .iter()
        .enumerate()
        .map(|(w, gate)| {
            let gate = Arc::clone(gate);
            let tx = tx.clone();
            thread::spawn(move || {
                if gate.wait_timeout(bound) {
                    let _ = tx.send(w);
                }
            })
        })
        .collect();
    drop(tx);

    // release in reverse submission order, one completion at a time
    let mut received = Vec::with_capacity(WORKERS);
    for w in (0..WORKERS).rev() {
        gates[w].count_down();
        match rx.recv_timeout(bound) {
            Ok(index) => received.push(index),
            Err(RecvTimeoutError::Timeout) => {
                return Err(Failure::liveness(format!("worker {w}"), bound));
            }
            Err(RecvTimeoutError::Disconnected) => fail!("workers hung up before worker {w} reported"),
        }
    }
    for handle in handles {
        if join_within(handle, bound)?.is_err() {
            fail!("a worker panicked");
        }
    }

    let expected: Vec<usize> = (0..WORKERS).rev().collect();
    ensure_eq!(received, expected, "results not delivered in completion order");
    ensure!(rx.try_recv().is_err(), "a worker reported twice");
    Ok(())
}

/// Starts a stage that applies `f` to its input once the input arrives.
fn stage<F>(input: mpsc::Receiver<u64>, f: F) -> (mpsc::Receiver<u64>, JoinHandle<()>)
where
    F: FnOnce(u64) -> u64 + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = thread::spawn(move || {
        if let Ok(value) = input.recv() {
            let _ = tx.send(f(value));
        }
    });
    (rx, handle)
}

fn dependent_stages(cx: &TestCx) -> TestOutcome {
    let bound = cx.long_delay();

    let (source_tx, source_rx) = mpsc::sync_channel(1);
    let (doubled, first) = stage(source_rx, |v| v * 2);
    let (shifted, second) = stage(doubled, |v| v + 1);
    if source_tx.send(20).is_err() {
        fail!("first stage hung up before its input arrived");
    }
    ensure_eq!(shifted.recv_timeout(bound).ok(), Some(41));
    for handle in [first, second] {
        ensure!(join_within(handle, bound)?.is_ok(), "a healthy stage panicked");
    }

    // the source completes exceptionally: it hangs up without a value
    let (broken_tx, broken_rx) = mpsc::sync_channel::<u64>(1);
    let (dependent, handle) = stage(broken_rx, |v| v * 2);
    drop(broken_tx);
    ensure_matches!(
        dependent.recv_timeout(bound),
        Err(RecvTimeoutError::Disconnected)
    );
    ensure!(join_within(handle, bound)?.is_ok());
    Ok(())
}
