//! Contract test bodies.
//!
//! Each submodule encodes, once, the invariants of one abstract interface as
//! a list of tests generic over a descriptor trait. Bind a contract to a
//! descriptor with [`Registry::bind`](crate::registry::Registry::bind):
//!
//! ```ignore
//! registry.bind(contracts::queue::contract(), MyQueue);
//! ```
//!
//! Tests obtain fresh containers from the descriptor and branch only on its
//! declared [`Capabilities`](crate::descriptor::Capabilities). A test that
//! does not apply to an implementation calls [`TestCx::skip`](crate::context::TestCx::skip).

pub mod blocking_queue;
pub mod collection;
pub mod map;
pub mod platform;
pub mod queue;

use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::context::TestCx;
use crate::descriptor::{Descriptor, IterationOrder};
use crate::error::{Failure, TestOutcome};
use crate::sync::AuxThread;

/// Whether `imp` may be shared with helper threads; skips the test if not.
pub(crate) fn shared_across_threads<D: Descriptor>(imp: &D, cx: &TestCx) -> bool {
    let concurrent = imp.capabilities().concurrent;
    if !concurrent {
        cx.skip("not declared concurrent");
    }
    concurrent
}

/// Awaits a helper that was just interrupted out of `operation`.
///
/// A helper still blocked after the bound ignored its interrupt, which is a
/// cancellation failure rather than a liveness one.
pub(crate) fn await_interrupted(cx: &TestCx, thread: AuxThread, operation: &str) -> TestOutcome {
    cx.await_termination(thread).map_err(|failure| match failure {
        Failure::Liveness { bound, .. } => Failure::cancellation(format!(
            "{operation} did not respond to interrupt within {bound:?}"
        )),
        other => other,
    })
}

/// Non-null entries of an iteration snapshot, in order.
pub(crate) fn present<E: Clone>(values: &[Option<E>]) -> Vec<E> {
    values.iter().flatten().cloned().collect()
}

/// Checks that `iterated` is `inserted` seen through the declared `order`.
pub(crate) fn check_order<E>(order: IterationOrder, inserted: &[E], iterated: &[E]) -> TestOutcome
where
    E: Ord + Clone + Debug,
{
    match order {
        IterationOrder::Insertion => {
            ensure_eq!(iterated, inserted, "iteration does not follow insertion order");
        }
        IterationOrder::Sorted => {
            let mut sorted = inserted.to_vec();
            sorted.sort();
            ensure_eq!(iterated, sorted.as_slice(), "iteration is not sorted");
        }
        IterationOrder::Unspecified => {
            let expected: BTreeSet<&E> = inserted.iter().collect();
            let actual: BTreeSet<&E> = iterated.iter().collect();
            ensure_eq!(actual, expected);
            ensure_eq!(iterated.len(), inserted.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delays;
    use crate::descriptor::Platform;
    use crate::error::FailureKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn order_checks() {
        let inserted = [3, 1, 2];
        assert!(check_order(IterationOrder::Insertion, &inserted, &[3, 1, 2]).is_ok());
        assert!(check_order(IterationOrder::Insertion, &inserted, &[1, 2, 3]).is_err());
        assert!(check_order(IterationOrder::Sorted, &inserted, &[1, 2, 3]).is_ok());
        assert!(check_order(IterationOrder::Sorted, &inserted, &[3, 1, 2]).is_err());
        assert!(check_order(IterationOrder::Unspecified, &inserted, &[2, 3, 1]).is_ok());
        assert!(check_order(IterationOrder::Unspecified, &inserted, &[2, 3]).is_err());
    }

    #[test]
    fn present_skips_nulls() {
        assert_eq!(present(&[Some(1), None, Some(2)]), vec![1, 2]);
    }

    #[test]
    fn deaf_helper_is_a_cancellation_failure() {
        let delays = Delays {
            long: Duration::from_millis(20),
            ..Delays::default()
        };
        let cx = TestCx::new(delays);
        let release = Arc::new(AtomicBool::new(false));
        let deaf = {
            let release = Arc::clone(&release);
            cx.spawn("deaf", move |_| {
                while !release.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok(())
            })
        };
        deaf.interrupt();
        let outcome = await_interrupted(&cx, deaf, "take");
        release.store(true, Ordering::SeqCst);

        let Err(failure) = outcome else {
            panic!("a helper ignoring its interrupt passed");
        };
        assert_eq!(failure.kind(), FailureKind::Cancellation);
        assert!(failure.to_string().contains("take did not respond"));
    }

    #[test]
    fn helper_failures_pass_through() {
        let cx = TestCx::for_testing();
        let helper = cx.spawn("failing", |_| Err(Failure::cancellation("left pending")));
        helper.interrupt();
        assert_eq!(
            await_interrupted(&cx, helper, "put"),
            Err(Failure::cancellation("left pending"))
        );
    }

    #[test]
    fn declared_concurrency_runs() {
        let cx = TestCx::for_testing();
        assert!(shared_across_threads(&Platform, &cx));
        assert_eq!(cx.skip_reason(), None);
    }
}
