//! Thread-local storage (`tl-*`).

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::TestCx;
use crate::descriptor::Descriptor;
use crate::error::TestOutcome;
use crate::registry::{Contract, TestCategory};

/// Suite name of the thread-local contract.
pub const SUITE: &str = "thread_local";

const INITIAL: i32 = 1;

thread_local! {
    static NUMBER: Cell<i32> = const { Cell::new(INITIAL) };
    static NAMES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static GUARD: RefCell<Option<DropCounter>> = const { RefCell::new(None) };
}

/// Counts its own drops.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// The thread-local contract.
pub fn contract<D: Descriptor>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "tl-001",
                name: "Per-thread initial value",
                description: "Each thread sees the initial value regardless of writes by other threads",
                category: TestCategory::ThreadLocal,
                tags: ["isolation"],
                expected: "a new thread reads the initializer's value",
                bound: Descriptor,
                test: |imp, cx| per_thread_initial_value(cx)
            },
            contract_test! {
                id: "tl-002",
                name: "set, replace and take",
                description: "Cell and RefCell accessors on LocalKey behave like the cell operations",
                category: TestCategory::ThreadLocal,
                tags: ["accessors"],
                expected: "replace returns the old value, take leaves the default",
                bound: Descriptor,
                test: |imp, cx| set_replace_take(cx)
            },
            contract_test! {
                id: "tl-003",
                name: "Destructors at thread exit",
                description: "A value stored in a thread-local is dropped when its thread exits",
                category: TestCategory::ThreadLocal,
                tags: ["lifecycle"],
                expected: "exactly one drop per exited thread, observed after join",
                bound: Descriptor,
                test: |imp, cx| destructors_run_at_exit(cx)
            },
        ],
    )
}

fn per_thread_initial_value(cx: &TestCx) -> TestOutcome {
    let writer = cx.spawn("tl-writer", |_| {
        ensure_eq!(NUMBER.get(), INITIAL);
        NUMBER.set(42);
        ensure_eq!(NUMBER.get(), 42);
        Ok(())
    });
    cx.await_termination(writer)?;

    let reader = cx.spawn("tl-reader", |_| {
        ensure_eq!(NUMBER.get(), INITIAL, "another thread's write leaked");
        Ok(())
    });
    cx.await_termination(reader)
}

fn set_replace_take(cx: &TestCx) -> TestOutcome {
    let thread = cx.spawn("tl-accessors", |_| {
        NUMBER.set(5);
        ensure_eq!(NUMBER.replace(6), 5);
        ensure_eq!(NUMBER.take(), 6);
        ensure_eq!(NUMBER.get(), 0);

        NAMES.with_borrow_mut(|names| names.push("first".to_string()));
        NAMES.with_borrow_mut(|names| names.push("second".to_string()));
        ensure_eq!(NAMES.with_borrow(Vec::len), 2);
        let taken = NAMES.take();
        ensure_eq!(taken, vec!["first".to_string(), "second".to_string()]);
        ensure!(NAMES.with_borrow(Vec::is_empty));
        Ok(())
    });
    cx.await_termination(thread)
}

fn destructors_run_at_exit(cx: &TestCx) -> TestOutcome {
    const THREADS: usize = 3;

    let drops = Arc::new(AtomicUsize::new(0));
    for t in 0..THREADS {
        let counter = Arc::clone(&drops);
        let thread = cx.spawn(&format!("tl-owner-{t}"), move |_| {
            GUARD.set(Some(DropCounter(counter)));
            Ok(())
        });
        cx.await_termination(thread)?;
        ensure_eq!(drops.load(Ordering::SeqCst), t + 1, "thread-local not dropped at exit");
    }
    Ok(())
}
