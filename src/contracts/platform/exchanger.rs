//! Two-party exchangers (`xchg-*`).
//!
//! Values handed to the exchanger are distinct elements, so every swap can be
//! traced back to the party that offered it.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use crate::context::TestCx;
use crate::contracts::{await_interrupted, shared_across_threads};
use crate::descriptor::{ExchangerImplementation, ExchangerUnderTest};
use crate::element::{Element, item_for};
use crate::error::{ContainerError, Failure, TestOutcome};
use crate::registry::{Contract, TestCategory};
use crate::sync::{AuxThread, CountDownLatch, Interrupt};

/// Suite name of the exchanger contract.
pub const SUITE: &str = "exchanger";

const PAIRS: usize = 4;

/// The exchanger contract.
pub fn contract<D: ExchangerImplementation>() -> Contract<D> {
    Contract::new(
        SUITE,
        vec![
            contract_test! {
                id: "xchg-001",
                name: "Two parties swap",
                description: "Two threads meeting at the exchanger each receive the other's value",
                category: TestCategory::Exchanger,
                tags: ["basic"],
                expected: "each party gets exactly the value the other offered",
                bound: ExchangerImplementation,
                test: |imp, cx| two_parties_swap(imp, cx)
            },
            contract_test! {
                id: "xchg-002",
                name: "Lone party times out",
                description: "exchange_timeout without a partner waits its bound and withdraws its value",
                category: TestCategory::Exchanger,
                tags: ["timeout"],
                expected: "Ok(None) after at least the timeout; the next pair swaps only their own values",
                bound: ExchangerImplementation,
                test: |imp, cx| lone_party_times_out(imp, cx)
            },
            contract_test! {
                id: "xchg-003",
                name: "Waiting party interrupted",
                description: "Interrupting a party waiting for a partner makes exchange report Interrupted",
                category: TestCategory::Exchanger,
                tags: ["blocking", "cancellation"],
                expected: "Interrupted, interrupt consumed, the withdrawn value never delivered",
                bound: ExchangerImplementation,
                test: |imp, cx| waiting_party_interrupted(imp, cx)
            },
            contract_test! {
                id: "xchg-004",
                name: "Many pairs",
                description: "Several parties exchanging at once are matched in pairs",
                category: TestCategory::Exchanger,
                tags: ["race", "liveness"],
                expected: "every value is received exactly once and never by the party that offered it",
                bound: ExchangerImplementation,
                test: |imp, cx| many_pairs(imp, cx)
            },
        ],
    )
}

/// Parties that exchange `values[i]` and record what they got back.
fn start_parties<D: ExchangerImplementation>(
    cx: &TestCx,
    exchanger: &Arc<D::Exchanger>,
    values: &[D::Elem],
    received: &Arc<Mutex<Vec<(D::Elem, D::Elem)>>>,
) -> Vec<AuxThread> {
    values
        .iter()
        .enumerate()
        .map(|(p, value)| {
            let exchanger = Arc::clone(exchanger);
            let received = Arc::clone(received);
            let value = value.clone();
            cx.spawn(&format!("party-{p}"), move |interrupt| {
                match exchanger.exchange(value.clone(), interrupt) {
                    Ok(got) => {
                        received.lock().push((value, got));
                        Ok(())
                    }
                    Err(err) => fail!("exchange of {value} failed: {err}"),
                }
            })
        })
        .collect()
}

fn two_parties_swap<D: ExchangerImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let exchanger = Arc::new(imp.exchanger());
    let values: Vec<D::Elem> = vec![item_for(1), item_for(2)];
    let received = Arc::new(Mutex::new(Vec::new()));

    for party in start_parties::<D>(cx, &exchanger, &values, &received) {
        cx.await_termination(party)?;
    }
    let received = received.lock();
    ensure_eq!(received.len(), 2);
    for (offered, got) in received.iter() {
        let expected = if offered.is_same(&values[0]) { &values[1] } else { &values[0] };
        ensure!(got.is_same(expected), "party offering {offered} received {got}");
    }
    Ok(())
}

fn lone_party_times_out<D: ExchangerImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let exchanger = Arc::new(imp.exchanger());
    let interrupt = Interrupt::current();
    let timeout = cx.delays().timeout;
    let abandoned: D::Elem = item_for(-1);

    let start = Instant::now();
    ensure_eq!(exchanger.exchange_timeout(abandoned.clone(), timeout, &interrupt), Ok(None));
    let elapsed = start.elapsed();
    ensure!(
        elapsed >= timeout,
        "exchange_timeout returned after {elapsed:?}, before its {timeout:?} bound"
    );

    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let received = Arc::new(Mutex::new(Vec::new()));
    let values: Vec<D::Elem> = vec![item_for(1), item_for(2)];
    for party in start_parties::<D>(cx, &exchanger, &values, &received) {
        cx.await_termination(party)?;
    }
    for (_, got) in received.lock().iter() {
        ensure!(!got.is_same(&abandoned), "a timed-out value was delivered later");
    }
    Ok(())
}

fn waiting_party_interrupted<D: ExchangerImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let exchanger = Arc::new(imp.exchanger());
    let started = Arc::new(CountDownLatch::new(1));
    let withdrawn: D::Elem = item_for(-1);

    let party = {
        let exchanger = Arc::clone(&exchanger);
        let started = Arc::clone(&started);
        let withdrawn = withdrawn.clone();
        cx.spawn("interrupted-party", move |interrupt| {
            started.count_down();
            match exchanger.exchange(withdrawn, interrupt) {
                Err(ContainerError::Interrupted) => {}
                Ok(got) => {
                    return Err(Failure::cancellation(format!(
                        "exchange returned {got} instead of reporting the interrupt"
                    )));
                }
                Err(err) => fail!("exchange failed with {err}"),
            }
            if interrupt.is_interrupted() {
                return Err(Failure::cancellation(
                    "exchange reported the interrupt but left it pending",
                ));
            }
            Ok(())
        })
    };

    cx.await_latch(&started)?;
    thread::sleep(cx.delays().short);
    party.interrupt();
    await_interrupted(cx, party, "exchange")?;

    let interrupt = Interrupt::current();
    match exchanger.exchange_timeout(item_for(1), cx.delays().timeout, &interrupt) {
        Ok(None) => Ok(()),
        Ok(Some(got)) => Err(Failure::cancellation(format!(
            "interrupted party's value {got} was delivered to a later partner"
        ))),
        Err(err) => fail!("exchange_timeout failed with {err}"),
    }
}

fn many_pairs<D: ExchangerImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    if !shared_across_threads(imp, cx) {
        return Ok(());
    }
    let exchanger = Arc::new(imp.exchanger());
    let values: Vec<D::Elem> = (0..2 * PAIRS).map(|i| item_for(i as i32)).collect();
    let received = Arc::new(Mutex::new(Vec::new()));

    for party in start_parties::<D>(cx, &exchanger, &values, &received) {
        cx.await_termination(party)?;
    }

    let received = received.lock();
    ensure_eq!(received.len(), values.len());
    let mut delivered: Vec<i32> = Vec::new();
    for (offered, got) in received.iter() {
        ensure!(!got.is_same(offered), "party offering {offered} received its own value");
        delivered.push(got.index());
    }
    delivered.sort_unstable();
    let expected: Vec<i32> = (0..2 * PAIRS as i32).collect();
    ensure_eq!(delivered, expected, "values lost or duplicated across exchanges");
    Ok(())
}
