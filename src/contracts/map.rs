//! Map contract (`map-*`).

use std::sync::Arc;

use parking_lot::Mutex;

use super::check_order;
use crate::context::TestCx;
use crate::descriptor::{IterationOrder, MapImplementation, MapUnderTest};
use crate::element::{Element, SIZE, item_for, seq_items, shuffled_indices};
use crate::error::{ContainerError, TestOutcome};
use crate::registry::{Contract, ContractTest, TestCategory};
use crate::sync::CountDownLatch;

/// Suite name of the map contract.
pub const SUITE: &str = "map";

/// The map contract, instantiated for `D`.
pub fn contract<D: MapImplementation>() -> Contract<D> {
    Contract::new(SUITE, collect_tests())
}

/// Every map test, in execution order.
pub fn collect_tests<D: MapImplementation>() -> Vec<ContractTest<D>> {
    vec![
        contract_test! {
            id: "map-001",
            name: "Fresh map is empty",
            description: "empty_map returns a distinct, empty instance on every call",
            category: TestCategory::Map,
            tags: ["basic", "factory"],
            expected: "no mappings, no state shared between instances",
            bound: MapImplementation,
            test: |imp, cx| fresh_map_is_empty(imp, cx)
        },
        contract_test! {
            id: "map-002",
            name: "Put and get",
            description: "put returns the previous mapping and get returns the stored value",
            category: TestCategory::Map,
            tags: ["basic", "identity"],
            expected: "None on first put, the old value on replacement",
            bound: MapImplementation,
            test: |imp, cx| put_and_get(imp, cx)
        },
        contract_test! {
            id: "map-003",
            name: "Null key policy",
            description: "A null key is accepted and found, or rejected leaving the map unchanged",
            category: TestCategory::Map,
            tags: ["null"],
            expected: "behavior matches the declared null-key policy",
            bound: MapImplementation,
            test: |imp, cx| null_key_policy(imp, cx)
        },
        contract_test! {
            id: "map-004",
            name: "Null value policy",
            description: "put(K, null) makes K present and null a contained value, or is rejected",
            category: TestCategory::Map,
            tags: ["null"],
            expected: "contains_key(K) and contains_value(null) when null values are permitted",
            bound: MapImplementation,
            test: |imp, cx| null_value_policy(imp, cx)
        },
        contract_test! {
            id: "map-005",
            name: "Remove",
            description: "remove returns the mapping once and then nothing",
            category: TestCategory::Map,
            tags: ["basic", "remove"],
            expected: "Some(old value), then None",
            bound: MapImplementation,
            test: |imp, cx| remove_returns_mapping(imp, cx)
        },
        contract_test! {
            id: "map-006",
            name: "Put if absent",
            description: "put_if_absent never replaces an existing mapping",
            category: TestCategory::Map,
            tags: ["atomic"],
            expected: "the first value survives and is returned to later callers",
            bound: MapImplementation,
            test: |imp, cx| put_if_absent_keeps_existing(imp, cx)
        },
        contract_test! {
            id: "map-007",
            name: "In-place entry mutation",
            description: "Values can be rewritten while iterating entries, or Unsupported is reported",
            category: TestCategory::Map,
            tags: ["entries"],
            expected: "updated values visible through get; unchanged map when unsupported",
            bound: MapImplementation,
            test: |imp, cx| entry_mutation(imp, cx)
        },
        contract_test! {
            id: "map-008",
            name: "Key iteration order",
            description: "Entries of a shuffled insertion of 0..SIZE follow the declared key order",
            category: TestCategory::Map,
            tags: ["order", "iteration"],
            expected: "insertion order, sorted order, or the same key set",
            bound: MapImplementation,
            test: |imp, cx| key_iteration_order(imp, cx)
        },
        contract_test! {
            id: "map-009",
            name: "Serialization round trip",
            description: "serial_clone yields a distinct, equal copy, or reports Unsupported",
            category: TestCategory::Map,
            tags: ["serialization"],
            expected: "equal entries; mutations do not leak between copies",
            bound: MapImplementation,
            test: |imp, cx| serialization_round_trip(imp, cx)
        },
        contract_test! {
            id: "map-010",
            name: "Concurrent put_if_absent",
            description: "Threads racing put_if_absent on the same keys elect one winner per key",
            category: TestCategory::Map,
            tags: ["concurrency", "atomic"],
            expected: "exactly one winner per key and the stored value is the winner's",
            bound: MapImplementation,
            test: |imp, cx| concurrent_put_if_absent(imp, cx)
        },
        contract_test! {
            id: "map-011",
            name: "Clear",
            description: "clear removes every mapping and the map stays usable",
            category: TestCategory::Map,
            tags: ["basic"],
            expected: "len 0 after clear, put works afterwards",
            bound: MapImplementation,
            test: |imp, cx| clear_empties(imp, cx)
        },
    ]
}

fn value_for<E: Element>(key: &E) -> E {
    item_for(key.index() + 1000)
}

fn populate<M, E>(map: &M, keys: &[E]) -> TestOutcome
where
    M: MapUnderTest<E>,
    E: Element,
{
    for key in keys {
        ensure_matches!(map.put(Some(key.clone()), Some(value_for(key))), Ok(None));
    }
    Ok(())
}

fn keys_of<E: Clone>(entries: &[(Option<E>, Option<E>)]) -> Vec<E> {
    entries.iter().filter_map(|(k, _)| k.clone()).collect()
}

fn fresh_map_is_empty<D: MapImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let first = imp.empty_map();
    let second = imp.empty_map();
    ensure!(first.is_empty());
    ensure_eq!(first.len(), 0);
    ensure!(first.entries().is_empty());
    ensure_eq!(first.get(Some(&item_for(0))), None);
    ensure!(!first.contains_key(Some(&item_for(0))));

    ensure_matches!(first.put(Some(item_for(1)), Some(item_for(2))), Ok(None));
    ensure!(second.is_empty(), "second instance observed a mutation of the first");
    Ok(())
}

fn put_and_get<D: MapImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    let keys: Vec<D::Elem> = seq_items(SIZE);
    let values: Vec<D::Elem> = keys.iter().map(value_for).collect();
    for (key, value) in keys.iter().zip(&values) {
        ensure_matches!(map.put(Some(key.clone()), Some(value.clone())), Ok(None));
    }
    ensure_eq!(map.len(), SIZE);

    for (key, inserted) in keys.iter().zip(&values) {
        match map.get(Some(key)) {
            Some(Some(value)) => {
                ensure!(value.is_same(inserted), "get({key}) is not the inserted object");
            }
            other => fail!("get({key}) returned {other:?}"),
        }
        ensure!(map.contains_key(Some(key)));
        ensure!(map.contains_value(Some(inserted)));
    }

    let key: D::Elem = item_for(3);
    let replaced = map.put(Some(key.clone()), Some(item_for(-3)));
    ensure_eq!(replaced, Ok(Some(Some(value_for(&key)))));
    ensure_eq!(map.get(Some(&key)), Some(Some(item_for(-3))));
    ensure_eq!(map.len(), SIZE, "replacing a value changed the size");
    ensure!(!map.contains_value(Some(&value_for(&key))));
    Ok(())
}

fn null_key_policy<D: MapImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    populate(&map, &seq_items::<D::Elem>(3))?;

    if imp.capabilities().permits_null_keys {
        ensure_matches!(map.put(None, Some(item_for(9))), Ok(None));
        ensure!(map.contains_key(None));
        ensure_eq!(map.get(None), Some(Some(item_for(9))));
        ensure_eq!(map.len(), 4);
        ensure_eq!(map.remove(None), Some(Some(item_for(9))));
        ensure!(!map.contains_key(None));
    } else {
        cx.log().debug("null keys prohibited; expecting rejection");
        let before = map.entries();
        ensure_matches!(map.put(None, Some(item_for(9))), Err(ContainerError::NullElement));
        ensure_matches!(
            map.put_if_absent(None, Some(item_for(9))),
            Err(ContainerError::NullElement)
        );
        ensure_eq!(map.len(), 3);
        ensure_eq!(map.entries(), before);
        ensure!(!map.contains_key(None));
    }
    Ok(())
}

fn null_value_policy<D: MapImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    populate(&map, &seq_items::<D::Elem>(3))?;
    let key: D::Elem = item_for(SIZE as i32);

    if imp.capabilities().permits_null_values {
        ensure_matches!(map.put(Some(key.clone()), None), Ok(None));
        ensure!(map.contains_key(Some(&key)));
        ensure!(map.contains_value(None));
        ensure_eq!(map.get(Some(&key)), Some(None));
        ensure_eq!(map.len(), 4);
        // a null mapping is still a mapping
        ensure_eq!(map.put(Some(key.clone()), Some(item_for(1))), Ok(Some(None)));
        ensure!(!map.contains_value(None));
    } else {
        cx.log().debug("null values prohibited; expecting rejection");
        let before = map.entries();
        ensure_matches!(map.put(Some(key.clone()), None), Err(ContainerError::NullElement));
        ensure_eq!(map.len(), 3);
        ensure_eq!(map.entries(), before);
        ensure!(!map.contains_key(Some(&key)));
        ensure!(!map.contains_value(None));
    }
    Ok(())
}

fn remove_returns_mapping<D: MapImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    let keys: Vec<D::Elem> = seq_items(SIZE);
    populate(&map, &keys)?;

    ensure_eq!(map.remove(Some(&item_for(-1))), None);
    for (removed, key) in keys.iter().enumerate() {
        ensure_eq!(map.remove(Some(key)), Some(Some(value_for(key))));
        ensure_eq!(map.remove(Some(key)), None);
        ensure!(!map.contains_key(Some(key)));
        ensure_eq!(map.len(), SIZE - removed - 1);
    }
    ensure!(map.is_empty());
    Ok(())
}

fn put_if_absent_keeps_existing<D: MapImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    let key: D::Elem = item_for(5);
    ensure_matches!(map.put_if_absent(Some(key.clone()), Some(item_for(50))), Ok(None));
    ensure_eq!(
        map.put_if_absent(Some(key.clone()), Some(item_for(51))),
        Ok(Some(Some(item_for(50))))
    );
    ensure_eq!(map.get(Some(&key)), Some(Some(item_for(50))));
    ensure_eq!(map.len(), 1);
    Ok(())
}

fn entry_mutation<D: MapImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    let keys: Vec<D::Elem> = seq_items(SIZE);
    populate(&map, &keys)?;

    let mut visited = 0;
    let outcome = map.update_values(&mut |key, value| {
        visited += 1;
        if let Some(key) = key {
            *value = Some(item_for(-key.index()));
        }
    });

    if imp.capabilities().mutable_entries {
        ensure_eq!(outcome, Ok(()));
        ensure_eq!(visited, SIZE);
        for key in &keys {
            ensure_eq!(map.get(Some(key)), Some(Some(item_for(-key.index()))));
        }
    } else {
        ensure_eq!(outcome, Err(ContainerError::Unsupported));
        for key in &keys {
            ensure_eq!(map.get(Some(key)), Some(Some(value_for(key))));
        }
        cx.skip("in-place entry mutation not supported");
    }
    ensure_eq!(map.len(), SIZE);
    Ok(())
}

fn key_iteration_order<D: MapImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    let inserted: Vec<D::Elem> = shuffled_indices(SIZE).into_iter().map(item_for).collect();
    populate(&map, &inserted)?;

    let entries = map.entries();
    cx.log().debug(format!("{} entries", entries.len()));
    check_order(imp.capabilities().order, &inserted, &keys_of(&entries))?;
    for (key, value) in &entries {
        if let Some(key) = key {
            ensure_eq!(value.as_ref(), Some(&value_for(key)), "entry for {key} has the wrong value");
        }
    }
    Ok(())
}

fn serialization_round_trip<D: MapImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let original = imp.empty_map();
    let keys: Vec<D::Elem> = shuffled_indices(SIZE).into_iter().map(item_for).collect();
    populate(&original, &keys)?;

    if !imp.capabilities().serializable {
        ensure_matches!(original.serial_clone().err(), Some(ContainerError::Unsupported));
        cx.skip("serialization not supported");
        return Ok(());
    }

    let copy = match original.serial_clone() {
        Ok(copy) => copy,
        Err(err) => fail!("serial_clone failed: {err}"),
    };
    ensure_eq!(copy.len(), original.len());
    let mut original_entries = original.entries();
    let mut copied_entries = copy.entries();
    if imp.capabilities().order == IterationOrder::Unspecified {
        original_entries.sort();
        copied_entries.sort();
    }
    ensure_eq!(copied_entries, original_entries, "round trip changed the entries");

    ensure_matches!(copy.put(Some(keys[0].clone()), Some(item_for(-7))), Ok(Some(_)));
    ensure_eq!(original.get(Some(&keys[0])), Some(Some(value_for(&keys[0]))));
    ensure!(copy.remove(Some(&keys[1])).is_some());
    ensure!(original.contains_key(Some(&keys[1])));
    Ok(())
}

fn concurrent_put_if_absent<D: MapImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    const THREADS: i32 = 4;

    if !imp.capabilities().concurrent {
        cx.skip("not declared concurrent");
        return Ok(());
    }

    let map = Arc::new(imp.empty_map());
    let wins = Arc::new(Mutex::new(Vec::new()));
    let ready = Arc::new(CountDownLatch::new(THREADS as usize));
    let go = Arc::new(CountDownLatch::new(1));
    let bound = cx.long_delay();
    let threads: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = Arc::clone(&map);
            let wins = Arc::clone(&wins);
            let ready = Arc::clone(&ready);
            let go = Arc::clone(&go);
            cx.spawn(&format!("racer-{t}"), move |_| {
                ready.count_down();
                go.await_open(bound)?;
                for key in seq_items::<D::Elem>(SIZE) {
                    let mine: D::Elem = item_for(key.index() * 10 + t);
                    match map.put_if_absent(Some(key.clone()), Some(mine)) {
                        Ok(None) => wins.lock().push((key.index(), t)),
                        Ok(Some(_)) => {}
                        Err(err) => fail!("put_if_absent({key}) failed: {err}"),
                    }
                }
                Ok(())
            })
        })
        .collect();

    cx.await_latch(&ready)?;
    go.count_down();
    for thread in threads {
        cx.await_termination(thread)?;
    }

    let mut wins = wins.lock().clone();
    wins.sort_unstable();
    ensure_eq!(wins.len(), SIZE, "expected one winner per key");
    for (key, (won_key, winner)) in seq_items::<D::Elem>(SIZE).iter().zip(&wins) {
        ensure_eq!(key.index(), *won_key, "{key} has no single winner");
        ensure_eq!(
            map.get(Some(key)),
            Some(Some(item_for(key.index() * 10 + winner))),
            "{key} does not hold the winner's value"
        );
    }
    ensure_eq!(map.len(), SIZE);
    Ok(())
}

fn clear_empties<D: MapImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let map = imp.empty_map();
    populate(&map, &seq_items::<D::Elem>(SIZE))?;
    map.clear();
    ensure!(map.is_empty());
    ensure!(map.entries().is_empty());
    ensure!(!map.contains_key(Some(&item_for(0))));
    ensure_matches!(map.put(Some(item_for(0)), Some(item_for(1))), Ok(None));
    ensure_eq!(map.len(), 1);
    Ok(())
}
