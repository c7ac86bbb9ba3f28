//! The harness catches broken implementations and misbehaving tests.
//!
//! Every test here binds a deliberately faulty descriptor and checks that the
//! runner reports the failure against that implementation, with the right
//! classification, without disturbing the other bound tests.

#[macro_use]
mod common;

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use common::Named;
use contract_tck::contracts::{blocking_queue, collection, map};
use contract_tck::descriptor::Descriptor;
use contract_tck::{
    BlockingQueueImplementation, BlockingQueueUnderTest, Capabilities, CollectionImplementation,
    CollectionUnderTest, ContainerError, Contract, ContractTest, FailureKind, Interrupt,
    IterationOrder, Item, MapImplementation, MapUnderTest, Registry, RunReport, Runner,
    TckConfig, TestCategory, TestMeta, TestCx, TestOutcome, TestStatus,
};
use parking_lot::Mutex;

/// A sorted map that rejects null keys whatever it declares.
#[derive(Debug, Default)]
struct StrictMap(Mutex<BTreeMap<Item, Option<Item>>>);

impl MapUnderTest<Item> for StrictMap {
    fn put(
        &self,
        key: Option<Item>,
        value: Option<Item>,
    ) -> Result<Option<Option<Item>>, ContainerError> {
        let key = key.ok_or(ContainerError::NullElement)?;
        Ok(self.0.lock().insert(key, value))
    }

    fn put_if_absent(
        &self,
        key: Option<Item>,
        value: Option<Item>,
    ) -> Result<Option<Option<Item>>, ContainerError> {
        let key = key.ok_or(ContainerError::NullElement)?;
        let mut map = self.0.lock();
        if let Some(existing) = map.get(&key) {
            return Ok(Some(*existing));
        }
        map.insert(key, value);
        Ok(None)
    }

    fn get(&self, key: Option<&Item>) -> Option<Option<Item>> {
        key.and_then(|k| self.0.lock().get(k).copied())
    }

    fn contains_key(&self, key: Option<&Item>) -> bool {
        key.is_some_and(|k| self.0.lock().contains_key(k))
    }

    fn contains_value(&self, value: Option<&Item>) -> bool {
        self.0.lock().values().any(|v| v.as_ref() == value)
    }

    fn remove(&self, key: Option<&Item>) -> Option<Option<Item>> {
        key.and_then(|k| self.0.lock().remove(k))
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn entries(&self) -> Vec<(Option<Item>, Option<Item>)> {
        self.0.lock().iter().map(|(k, v)| (Some(*k), *v)).collect()
    }

    fn update_values(
        &self,
        update: &mut dyn FnMut(Option<&Item>, &mut Option<Item>),
    ) -> Result<(), ContainerError> {
        for (key, value) in self.0.lock().iter_mut() {
            update(Some(key), value);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StrictMapImpl {
    name: &'static str,
    claims_null_keys: bool,
}

impl Descriptor for StrictMapImpl {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::NONE
            .null_values()
            .mutable_entries()
            .order(IterationOrder::Sorted);
        if self.claims_null_keys {
            caps.null_keys()
        } else {
            caps
        }
    }
}

impl MapImplementation for StrictMapImpl {
    type Elem = Item;
    type Map = StrictMap;

    fn empty_map(&self) -> StrictMap {
        StrictMap::default()
    }
}

fn meta(id: &str) -> TestMeta {
    TestMeta {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        category: TestCategory::BlockingQueue,
        tags: vec!["self-test".to_string()],
        expected: String::new(),
    }
}

/// SELF-001: a descriptor that misstates its null-key policy fails map-003,
/// and only its own binding fails.
#[test]
fn self_001_false_capability_is_attributed() {
    common::init_test_logging();
    test_phase!("SELF-001 false capability claim");

    let mut registry = Registry::new();
    registry
        .bind(
            map::contract(),
            StrictMapImpl {
                name: "honest-map",
                claims_null_keys: false,
            },
        )
        .bind(
            map::contract(),
            StrictMapImpl {
                name: "lying-map",
                claims_null_keys: true,
            },
        );
    let report = Runner::default().run(&registry);

    let honest = report.record("map/honest-map/map-003").expect("honest record");
    assert_with_log!(
        honest.status == TestStatus::Passed,
        "honest null-key policy",
        TestStatus::Passed,
        honest.status
    );

    let lying = report.record("map/lying-map/map-003").expect("lying record");
    assert_with_log!(
        lying.status == TestStatus::Failed,
        "false null-key claim",
        TestStatus::Failed,
        lying.status
    );
    assert_eq!(lying.failure_kind, Some(FailureKind::Contract));
    assert_eq!(lying.implementation, "lying-map");
    assert!(!lying.logs.is_empty(), "failed test should carry its checkpoint log");

    let failed: Vec<String> = report.failures().map(|r| r.qualified_name()).collect();
    assert_with_log!(
        failed == ["map/lying-map/map-003"],
        "only the false claim fails",
        ["map/lying-map/map-003"],
        failed
    );

    test_complete!("self_001_false_capability_is_attributed", total = report.total);
}

static RELEASE_DEAF: AtomicBool = AtomicBool::new(false);

fn deaf_thread(_: &Named, cx: &TestCx) -> TestOutcome {
    let thread = cx.spawn("deaf", |_| {
        while !RELEASE_DEAF.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    });
    cx.await_termination(thread)
}

/// SELF-002: an auxiliary thread that ignores interrupts is a liveness
/// failure, reported within the configured bound.
#[test]
fn self_002_stuck_thread_is_liveness_failure() {
    common::init_test_logging();
    test_phase!("SELF-002 stuck aux thread");

    let mut registry = Registry::new();
    registry.bind(
        Contract::new(
            "self",
            vec![
                ContractTest::new(meta("self-stuck"), deaf_thread),
                ContractTest::new(meta("self-after"), |_: &Named, _| Ok(())),
            ],
        ),
        Named {
            name: "fake",
            capabilities: Capabilities::NONE,
        },
    );

    let config = TckConfig::default().delay_factor(0.01);
    let bound = config.delays().long;
    let start = Instant::now();
    let report = Runner::new(config).run(&registry);
    let elapsed = start.elapsed();
    RELEASE_DEAF.store(true, Ordering::SeqCst);

    let stuck = report.record("self/fake/self-stuck").expect("stuck record");
    assert_with_log!(
        stuck.failure_kind == Some(FailureKind::Liveness),
        "stuck thread classification",
        Some(FailureKind::Liveness),
        stuck.failure_kind
    );
    assert!(stuck.message.as_deref().unwrap_or_default().contains("deaf"));
    assert!(
        elapsed < bound * 10,
        "liveness failure took {elapsed:?}, bound {bound:?}"
    );

    let after = report.record("self/fake/self-after").expect("later record");
    assert_eq!(after.status, TestStatus::Passed);

    test_complete!("self_002_stuck_thread_is_liveness_failure", elapsed_ms = elapsed.as_millis());
}

/// SELF-003: a test that reports a missing cancellation is classified apart
/// from plain contract failures.
#[test]
fn self_003_interrupt_ignored_is_cancellation_failure() {
    common::init_test_logging();
    test_phase!("SELF-003 cancellation classification");

    let mut registry = Registry::new();
    registry.bind(
        Contract::new(
            "self",
            vec![ContractTest::new(meta("self-cancel"), |_: &Named, cx| {
                let thread = cx.spawn("waiter", |interrupt| {
                    let deadline = Instant::now() + Duration::from_secs(5);
                    while Instant::now() < deadline {
                        if interrupt.park_timeout(Duration::from_millis(5)).is_err() {
                            return Err(contract_tck::Failure::cancellation(
                                "interrupt observed where none was expected",
                            ));
                        }
                    }
                    Ok(())
                });
                std::thread::sleep(cx.delays().short);
                thread.interrupt();
                cx.await_termination(thread)
            })],
        ),
        Named {
            name: "fake",
            capabilities: Capabilities::NONE,
        },
    );
    let report = Runner::new(TckConfig::default().delay_factor(0.1)).run(&registry);
    let record = report.record("self/fake/self-cancel").expect("record");
    assert_with_log!(
        record.failure_kind == Some(FailureKind::Cancellation),
        "cancellation classification",
        Some(FailureKind::Cancellation),
        record.failure_kind
    );

    test_complete!("self_003_interrupt_ignored_is_cancellation_failure");
}

/// How a [`FaultyQueue`] breaks the blocking queue contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueFault {
    Honest,
    /// `poll_timeout` gives up at once instead of waiting.
    EarlyTimeout,
    /// `take` hands back a different element than the one at the head.
    WrongElement,
    /// `take` waits without ever looking at its interrupt.
    DeafTake,
}

static RELEASE_DEAF_TAKE: AtomicBool = AtomicBool::new(false);

const WAIT_SLICE: Duration = Duration::from_millis(1);

/// An unbounded queue that polls for elements in short interruptible slices.
#[derive(Debug)]
struct FaultyQueue {
    items: Mutex<VecDeque<Item>>,
    fault: QueueFault,
}

impl FaultyQueue {
    fn deaf_take(&self) -> Item {
        loop {
            if let Some(item) = self.poll() {
                return item;
            }
            if RELEASE_DEAF_TAKE.load(Ordering::SeqCst) {
                return Item::new(-1);
            }
            std::thread::sleep(WAIT_SLICE);
        }
    }
}

impl BlockingQueueUnderTest<Item> for FaultyQueue {
    fn offer(&self, element: Option<Item>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.items.lock().push_back(element);
        Ok(true)
    }

    fn offer_timeout(
        &self,
        element: Option<Item>,
        _timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        interrupt.checkpoint()?;
        self.offer(element)
    }

    fn put(&self, element: Option<Item>, interrupt: &Interrupt) -> Result<(), ContainerError> {
        interrupt.checkpoint()?;
        self.offer(element).map(|_| ())
    }

    fn poll(&self) -> Option<Item> {
        self.items.lock().pop_front()
    }

    fn poll_timeout(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<Item>, ContainerError> {
        interrupt.checkpoint()?;
        if self.fault == QueueFault::EarlyTimeout {
            return Ok(self.poll());
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.poll() {
                return Ok(Some(item));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            interrupt.park_timeout(WAIT_SLICE.min(deadline - now))?;
        }
    }

    fn take(&self, interrupt: &Interrupt) -> Result<Item, ContainerError> {
        if self.fault == QueueFault::DeafTake {
            return Ok(self.deaf_take());
        }
        interrupt.checkpoint()?;
        loop {
            if let Some(item) = self.poll() {
                if self.fault == QueueFault::WrongElement {
                    return Ok(Item::new(item.value() + 1000));
                }
                return Ok(item);
            }
            interrupt.park_timeout(WAIT_SLICE)?;
        }
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn remaining_capacity(&self) -> Option<usize> {
        None
    }

    fn drain_to(&self, sink: &mut Vec<Item>, max: usize) -> usize {
        let mut items = self.items.lock();
        let count = max.min(items.len());
        sink.extend(items.drain(..count));
        count
    }
}

#[derive(Debug, Clone)]
struct FaultyQueueImpl {
    name: &'static str,
    fault: QueueFault,
    concurrent: bool,
}

impl FaultyQueueImpl {
    const fn shared(name: &'static str, fault: QueueFault) -> Self {
        Self {
            name,
            fault,
            concurrent: true,
        }
    }
}

impl Descriptor for FaultyQueueImpl {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        if self.concurrent {
            Capabilities::NONE.concurrent()
        } else {
            Capabilities::NONE
        }
    }
}

impl BlockingQueueImplementation for FaultyQueueImpl {
    type Elem = Item;
    type Queue = FaultyQueue;

    fn empty_queue(&self) -> FaultyQueue {
        FaultyQueue {
            items: Mutex::new(VecDeque::new()),
            fault: self.fault,
        }
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

fn run_blocking_queue(descriptor: FaultyQueueImpl) -> RunReport {
    let mut registry = Registry::new();
    registry.bind(blocking_queue::contract(), descriptor);
    Runner::new(TckConfig::default().delay_factor(0.05)).run(&registry)
}

/// Asserts that `qualified` failed in `report` with a failure of `kind`.
fn assert_failed_with(report: &RunReport, qualified: &str, kind: FailureKind) {
    let record = report.record(qualified).expect("record for the faulty test");
    assert_with_log!(
        record.failure_kind == Some(kind),
        "failure classification",
        Some(kind),
        record.failure_kind
    );
    assert_eq!(record.status, TestStatus::Failed);
    assert!(
        report.failures().any(|r| r.qualified_name() == qualified),
        "{qualified} missing from the failure list"
    );
}

/// SELF-004: a timed poll that returns before its bound fails bq-004.
#[test]
fn self_004_early_timed_poll_fails() {
    common::init_test_logging();
    test_phase!("SELF-004 early timed poll");

    let report = run_blocking_queue(FaultyQueueImpl::shared(
        "early-timeout",
        QueueFault::EarlyTimeout,
    ));
    assert_failed_with(&report, "blocking_queue/early-timeout/bq-004", FailureKind::Contract);
    let message = report
        .record("blocking_queue/early-timeout/bq-004")
        .and_then(|r| r.message.clone())
        .unwrap_or_default();
    assert!(message.contains("before its"), "unexpected message: {message}");

    let released = report.record("blocking_queue/early-timeout/bq-005").expect("bq-005");
    assert_eq!(released.status, TestStatus::Passed);

    test_complete!("self_004_early_timed_poll_fails", failed = report.failed);
}

/// SELF-005: a take that hands back the wrong element fails bq-005 from the
/// taker thread.
#[test]
fn self_005_wrong_element_from_take_fails() {
    common::init_test_logging();
    test_phase!("SELF-005 wrong element from take");

    let report = run_blocking_queue(FaultyQueueImpl::shared(
        "wrong-element",
        QueueFault::WrongElement,
    ));
    assert_failed_with(&report, "blocking_queue/wrong-element/bq-005", FailureKind::Contract);
    let record = report.record("blocking_queue/wrong-element/bq-005").expect("bq-005");
    assert_eq!(record.implementation, "wrong-element");

    let timed = report.record("blocking_queue/wrong-element/bq-004").expect("bq-004");
    assert_eq!(timed.status, TestStatus::Passed);

    test_complete!("self_005_wrong_element_from_take_fails", failed = report.failed);
}

/// SELF-006: a take that never observes its interrupt fails bq-006 as a
/// cancellation failure, not a liveness one.
#[test]
fn self_006_deaf_take_is_cancellation_failure() {
    common::init_test_logging();
    test_phase!("SELF-006 take ignores interrupt");

    let report = run_blocking_queue(FaultyQueueImpl::shared("deaf-take", QueueFault::DeafTake));
    RELEASE_DEAF_TAKE.store(true, Ordering::SeqCst);

    assert_failed_with(&report, "blocking_queue/deaf-take/bq-006", FailureKind::Cancellation);
    let message = report
        .record("blocking_queue/deaf-take/bq-006")
        .and_then(|r| r.message.clone())
        .unwrap_or_default();
    assert!(message.contains("take did not respond"), "unexpected message: {message}");

    test_complete!("self_006_deaf_take_is_cancellation_failure", failed = report.failed);
}

/// SELF-007: thread-based tests are skipped for a queue not declared
/// concurrent, and the rest still run.
#[test]
fn self_007_single_threaded_queue_skips_thread_tests() {
    common::init_test_logging();
    test_phase!("SELF-007 single-threaded queue");

    let report = run_blocking_queue(FaultyQueueImpl {
        name: "single-threaded",
        fault: QueueFault::Honest,
        concurrent: false,
    });

    for id in ["bq-005", "bq-006", "bq-008", "bq-010", "bq-013"] {
        let record = report
            .record(&format!("blocking_queue/single-threaded/{id}"))
            .expect("thread test record");
        assert_with_log!(
            record.status == TestStatus::Skipped,
            "thread test on a single-threaded queue",
            TestStatus::Skipped,
            record.status
        );
    }
    let timed = report.record("blocking_queue/single-threaded/bq-004").expect("bq-004");
    assert_eq!(timed.status, TestStatus::Passed);
    let failed: Vec<String> = report.failures().map(|r| r.qualified_name()).collect();
    assert!(failed.is_empty(), "honest queue failed: {failed:?}");

    test_complete!("self_007_single_threaded_queue_skips_thread_tests", skipped = report.skipped);
}

/// What a [`SloppyList`] does to itself before rejecting a null.
#[derive(Debug, Clone, Copy)]
enum NullMishap {
    /// Appends a placeholder element.
    Grows,
    /// Reverses its contents.
    Reorders,
}

/// A list that rejects null, but not before disturbing its contents.
#[derive(Debug)]
struct SloppyList {
    items: Mutex<Vec<Item>>,
    mishap: NullMishap,
}

impl CollectionUnderTest<Item> for SloppyList {
    fn add(&self, element: Option<Item>) -> Result<bool, ContainerError> {
        let mut items = self.items.lock();
        let Some(element) = element else {
            match self.mishap {
                NullMishap::Grows => items.push(Item::new(-1)),
                NullMishap::Reorders => items.reverse(),
            }
            return Err(ContainerError::NullElement);
        };
        items.push(element);
        Ok(true)
    }

    fn contains(&self, element: Option<&Item>) -> bool {
        element.is_some_and(|e| self.items.lock().contains(e))
    }

    fn remove(&self, element: Option<&Item>) -> bool {
        let mut items = self.items.lock();
        let position = element.and_then(|e| items.iter().position(|i| i == e));
        position.map(|p| items.remove(p)).is_some()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn clear(&self) {
        self.items.lock().clear();
    }

    fn to_vec(&self) -> Vec<Option<Item>> {
        self.items.lock().iter().copied().map(Some).collect()
    }

    fn retain(&self, keep: &mut dyn FnMut(Option<&Item>) -> bool) {
        self.items.lock().retain(|item| keep(Some(item)));
    }
}

#[derive(Debug, Clone)]
struct SloppyListImpl {
    name: &'static str,
    mishap: NullMishap,
}

impl Descriptor for SloppyListImpl {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .duplicates()
            .order(IterationOrder::Insertion)
    }
}

impl CollectionImplementation for SloppyListImpl {
    type Elem = Item;
    type Collection = SloppyList;

    fn empty_collection(&self) -> SloppyList {
        SloppyList {
            items: Mutex::new(Vec::new()),
            mishap: self.mishap,
        }
    }
}

/// SELF-008: rejecting a null is not enough; the collection must also be
/// left exactly as it was, in size and in order.
#[test]
fn self_008_rejected_null_must_leave_contents_alone() {
    common::init_test_logging();
    test_phase!("SELF-008 rejected null disturbs contents");

    let mut registry = Registry::new();
    registry
        .bind(
            collection::contract(),
            SloppyListImpl {
                name: "growing-list",
                mishap: NullMishap::Grows,
            },
        )
        .bind(
            collection::contract(),
            SloppyListImpl {
                name: "reordering-list",
                mishap: NullMishap::Reorders,
            },
        );
    let report = Runner::default().run(&registry);

    for name in ["growing-list", "reordering-list"] {
        let qualified = format!("collection/{name}/coll-003");
        assert_failed_with(&report, &qualified, FailureKind::Contract);
        let record = report.record(&qualified).expect("coll-003 record");
        assert_eq!(record.implementation, name);
    }

    test_complete!("self_008_rejected_null_must_leave_contents_alone", total = report.total);
}
