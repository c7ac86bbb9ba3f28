//! One-time initialization (`once-*`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once, OnceLock};

use parking_lot::Mutex;

use crate::context::TestCx;
use crate::descriptor::Descriptor;
use crate::error::TestOutcome;
use crate::registry::{Contract, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the one-time initialization contract.
pub const SUITE: &str = "once";

const RACERS: usize = 4;

/// The one-time initialization contract.
pub fn contract<D: Descriptor>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "once-001",
                name: "get_or_init race",
                description: "Racing get_or_init calls run the initializer once and agree on the value",
                category: TestCategory::Once,
                tags: ["race"],
                expected: "one initializer run; every caller sees the same value",
                bound: Descriptor,
                test: |imp, cx| get_or_init_race(cx)
            },
            contract_test! {
                id: "once-002",
                name: "call_once race",
                description: "Racing call_once calls run the closure exactly once",
                category: TestCategory::Once,
                tags: ["race"],
                expected: "one closure run; completed afterwards",
                bound: Descriptor,
                test: |imp, cx| call_once_race(cx)
            },
            contract_test! {
                id: "once-003",
                name: "set after init",
                description: "set on an initialized cell fails and hands the value back",
                category: TestCategory::Once,
                tags: ["basic"],
                expected: "Err(value) and the first value kept",
                bound: Descriptor,
                test: |imp, cx| set_after_init(cx)
            },
        ],
    )
}

/// Starts `RACERS` threads that run `body` together once all have started.
fn race<F>(cx: &TestCx, name: &str, body: F) -> TestOutcome
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let ready = Arc::new(CountDownLatch::new(RACERS));
    let bound = cx.long_delay();
    let threads: Vec<_> = (0..RACERS)
        .map(|r| {
            let body = Arc::clone(&body);
            let ready = Arc::clone(&ready);
            cx.spawn(&format!("{name}-{r}"), move |_| {
                ready.count_down();
                ready.await_open(bound)?;
                body(r);
                Ok(())
            })
        })
        .collect();
    for thread in threads {
        cx.await_termination(thread)?;
    }
    Ok(())
}

fn get_or_init_race(cx: &TestCx) -> TestOutcome {
    let cell: Arc<OnceLock<usize>> = Arc::new(OnceLock::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let cell = Arc::clone(&cell);
        let runs = Arc::clone(&runs);
        let seen = Arc::clone(&seen);
        race(cx, "initializer", move |r| {
            let value = *cell.get_or_init(|| {
                runs.fetch_add(1, Ordering::SeqCst);
                r
            });
            seen.lock().push(value);
        })?;
    }

    ensure_eq!(runs.load(Ordering::SeqCst), 1, "initializer ran more than once");
    let winner = match cell.get() {
        Some(winner) => *winner,
        None => fail!("cell uninitialized after get_or_init"),
    };
    let seen = seen.lock();
    ensure_eq!(seen.len(), RACERS);
    ensure!(seen.iter().all(|v| *v == winner), "callers disagree: {seen:?}");
    Ok(())
}

fn call_once_race(cx: &TestCx) -> TestOutcome {
    let once = Arc::new(Once::new());
    let runs = Arc::new(AtomicUsize::new(0));
    ensure!(!once.is_completed());
    {
        let once = Arc::clone(&once);
        let runs = Arc::clone(&runs);
        race(cx, "caller", move |_| {
            once.call_once(|| {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        })?;
    }
    ensure_eq!(runs.load(Ordering::SeqCst), 1);
    ensure!(once.is_completed());
    Ok(())
}

fn set_after_init(_cx: &TestCx) -> TestOutcome {
    let cell = OnceLock::new();
    ensure_eq!(cell.get(), None);
    ensure_eq!(cell.set(1), Ok(()));
    ensure_eq!(cell.set(2), Err(2));
    ensure_eq!(cell.get(), Some(&1));
    ensure_eq!(cell.get_or_init(|| 3), &1);
    ensure_eq!(cell.into_inner(), Some(1));
    Ok(())
}
