//! Collection contract (`coll-*`): lists and sets.

use std::fmt::Debug;
use std::sync::Arc;

use super::{check_order, present};
use crate::context::TestCx;
use crate::descriptor::{CollectionImplementation, CollectionUnderTest, IterationOrder};
use crate::element::{Element, SIZE, item_for, negative_seq_items, seq_items, shuffled_indices};
use crate::error::{ContainerError, TestOutcome};
use crate::registry::{Contract, ContractTest, TestCategory};

/// Suite name of the collection contract.
pub const SUITE: &str = "collection";

/// The collection contract, instantiated for `D`.
pub fn contract<D: CollectionImplementation>() -> Contract<D> {
    Contract::new(SUITE, collect_tests())
}

/// Every collection test, in execution order.
pub fn collect_tests<D: CollectionImplementation>() -> Vec<ContractTest<D>> {
    vec![
        contract_test! {
            id: "coll-001",
            name: "Fresh collection is empty",
            description: "empty_collection returns a distinct, empty instance on every call",
            category: TestCategory::Collection,
            tags: ["basic", "factory"],
            expected: "len 0, no elements, no state shared between instances",
            bound: CollectionImplementation,
            test: |imp, cx| fresh_collection_is_empty(imp, cx)
        },
        contract_test! {
            id: "coll-002",
            name: "Add then contains",
            description: "Added elements are found and iteration yields the inserted objects",
            category: TestCategory::Collection,
            tags: ["basic", "identity"],
            expected: "every added element is contained and identical to what was inserted",
            bound: CollectionImplementation,
            test: |imp, cx| add_then_contains(imp, cx)
        },
        contract_test! {
            id: "coll-003",
            name: "Null element policy",
            description: "Null is accepted and found, or rejected leaving the collection unchanged",
            category: TestCategory::Collection,
            tags: ["null"],
            expected: "behavior matches the declared null policy",
            bound: CollectionImplementation,
            test: |imp, cx| null_element_policy(imp, cx)
        },
        contract_test! {
            id: "coll-004",
            name: "Duplicate policy",
            description: "Adding an equal element twice keeps one or two copies as declared",
            category: TestCategory::Collection,
            tags: ["duplicates"],
            expected: "second add changes the collection only when duplicates are allowed",
            bound: CollectionImplementation,
            test: |imp, cx| duplicate_policy(imp, cx)
        },
        contract_test! {
            id: "coll-005",
            name: "Iteration order",
            description: "Iterating a shuffled insertion of 0..SIZE follows the declared order",
            category: TestCategory::Collection,
            tags: ["order", "iteration"],
            expected: "insertion order, sorted order, or the same set of elements",
            bound: CollectionImplementation,
            test: |imp, cx| iteration_order(imp, cx)
        },
        contract_test! {
            id: "coll-006",
            name: "Remove",
            description: "Removing a present element shrinks the collection; an absent one is a no-op",
            category: TestCategory::Collection,
            tags: ["basic", "remove"],
            expected: "remove returns true exactly once per present element",
            bound: CollectionImplementation,
            test: |imp, cx| remove_present_and_absent(imp, cx)
        },
        contract_test! {
            id: "coll-007",
            name: "Clear",
            description: "clear empties the collection and it stays usable",
            category: TestCategory::Collection,
            tags: ["basic"],
            expected: "len 0 after clear, add works afterwards",
            bound: CollectionImplementation,
            test: |imp, cx| clear_empties(imp, cx)
        },
        contract_test! {
            id: "coll-008",
            name: "Retain",
            description: "retain keeps exactly the elements matching the predicate",
            category: TestCategory::Collection,
            tags: ["bulk"],
            expected: "only even indices remain",
            bound: CollectionImplementation,
            test: |imp, cx| retain_filters(imp, cx)
        },
        contract_test! {
            id: "coll-009",
            name: "Serialization round trip",
            description: "serial_clone yields a distinct, equal copy, or reports Unsupported",
            category: TestCategory::Collection,
            tags: ["serialization"],
            expected: "equal size, order and elements; mutations do not leak between copies",
            bound: CollectionImplementation,
            test: |imp, cx| serialization_round_trip(imp, cx)
        },
        contract_test! {
            id: "coll-010",
            name: "Negative elements",
            description: "Elements with negative indices order by their natural order",
            category: TestCategory::Collection,
            tags: ["order"],
            expected: "iteration follows the declared order for negative indices too",
            bound: CollectionImplementation,
            test: |imp, cx| negative_elements(imp, cx)
        },
        contract_test! {
            id: "coll-011",
            name: "Concurrent adds",
            description: "Distinct elements added from several threads are all retained",
            category: TestCategory::Collection,
            tags: ["concurrency"],
            expected: "every element added by every thread is present exactly once",
            bound: CollectionImplementation,
            test: |imp, cx| concurrent_adds(imp, cx)
        },
    ]
}

fn fill<C, E>(collection: &C, elements: &[E]) -> TestOutcome
where
    C: CollectionUnderTest<E>,
    E: Clone + Debug,
{
    for element in elements {
        ensure_matches!(collection.add(Some(element.clone())), Ok(true));
    }
    Ok(())
}

fn fresh_collection_is_empty<D: CollectionImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let first = imp.empty_collection();
    let second = imp.empty_collection();
    ensure!(first.is_empty());
    ensure_eq!(first.len(), 0);
    ensure!(first.to_vec().is_empty());
    ensure!(!first.contains(Some(&item_for(0))));

    cx.log().debug("mutating first instance");
    ensure_matches!(first.add(Some(item_for(1))), Ok(true));
    ensure_eq!(first.len(), 1);
    ensure!(second.is_empty(), "second instance observed a mutation of the first");
    ensure!(imp.empty_collection().is_empty());
    Ok(())
}

fn add_then_contains<D: CollectionImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    let elements: Vec<D::Elem> = seq_items(SIZE);
    fill(&collection, &elements)?;

    ensure_eq!(collection.len(), SIZE);
    ensure!(!collection.is_empty());
    for element in &elements {
        ensure!(collection.contains(Some(element)), "{element} not found");
    }
    ensure!(!collection.contains(Some(&item_for(SIZE as i32))));

    for found in present(&collection.to_vec()) {
        ensure!(
            elements.iter().any(|e| e.is_same(&found)),
            "iteration yielded {found}, which is not the inserted object"
        );
    }
    Ok(())
}

fn null_element_policy<D: CollectionImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    fill(&collection, &seq_items::<D::Elem>(3))?;

    if imp.capabilities().permits_null_keys {
        cx.log().debug("null permitted; expecting acceptance");
        ensure_matches!(collection.add(None), Ok(true));
        ensure!(collection.contains(None));
        ensure_eq!(collection.len(), 4);
        ensure!(collection.to_vec().contains(&None));
        ensure!(collection.remove(None));
        ensure!(!collection.contains(None));
        ensure_eq!(collection.len(), 3);
    } else {
        cx.log().debug("null prohibited; expecting rejection");
        let before = collection.to_vec();
        ensure_matches!(collection.add(None), Err(ContainerError::NullElement));
        ensure_eq!(collection.len(), 3);
        ensure_eq!(collection.to_vec(), before);
        ensure!(!collection.contains(None));
    }
    Ok(())
}

fn duplicate_policy<D: CollectionImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    let element: D::Elem = item_for(7);
    ensure_matches!(collection.add(Some(element.clone())), Ok(true));

    if imp.capabilities().duplicates {
        ensure_matches!(collection.add(Some(item_for(7))), Ok(true));
        ensure_eq!(collection.len(), 2);
        ensure!(collection.remove(Some(&element)));
        ensure!(collection.contains(Some(&element)), "remove took both copies");
    } else {
        ensure_matches!(collection.add(Some(item_for(7))), Ok(false));
        ensure_eq!(collection.len(), 1);
        ensure!(collection.remove(Some(&element)));
        ensure!(!collection.contains(Some(&element)));
    }
    Ok(())
}

fn iteration_order<D: CollectionImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    let inserted: Vec<D::Elem> = shuffled_indices(SIZE).into_iter().map(item_for).collect();
    fill(&collection, &inserted)?;

    let order = imp.capabilities().order;
    cx.log().debug(format!("checking {order:?} iteration order"));
    let iterated = present(&collection.to_vec());
    check_order(order, &inserted, &iterated)?;

    // a second pass without mutation yields the same sequence
    ensure_eq!(present(&collection.to_vec()), iterated);
    Ok(())
}

fn remove_present_and_absent<D: CollectionImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    let elements: Vec<D::Elem> = seq_items(SIZE);
    fill(&collection, &elements)?;

    ensure!(!collection.remove(Some(&item_for(-1))));
    ensure_eq!(collection.len(), SIZE);

    for (removed, element) in elements.iter().enumerate() {
        ensure!(collection.remove(Some(element)), "{element} was not removed");
        ensure!(!collection.remove(Some(element)), "{element} removed twice");
        ensure!(!collection.contains(Some(element)));
        ensure_eq!(collection.len(), SIZE - removed - 1);
    }
    ensure!(collection.is_empty());
    Ok(())
}

fn clear_empties<D: CollectionImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    fill(&collection, &seq_items::<D::Elem>(SIZE))?;
    collection.clear();
    ensure!(collection.is_empty());
    ensure!(collection.to_vec().is_empty());
    ensure!(!collection.contains(Some(&item_for(0))));

    ensure_matches!(collection.add(Some(item_for(0))), Ok(true));
    ensure_eq!(collection.len(), 1);
    Ok(())
}

fn retain_filters<D: CollectionImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    let elements: Vec<D::Elem> = seq_items(SIZE);
    fill(&collection, &elements)?;

    let mut visited = 0;
    collection.retain(&mut |element| {
        visited += 1;
        element.is_some_and(|e| e.index() % 2 == 0)
    });
    ensure_eq!(visited, SIZE);
    ensure_eq!(collection.len(), SIZE / 2);
    for element in &elements {
        ensure_eq!(collection.contains(Some(element)), element.index() % 2 == 0);
    }
    Ok(())
}

fn serialization_round_trip<D: CollectionImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    let original = imp.empty_collection();
    let inserted: Vec<D::Elem> = shuffled_indices(SIZE).into_iter().map(item_for).collect();
    fill(&original, &inserted)?;

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

    let original_items = present(&original.to_vec());
    let copied_items = present(&copy.to_vec());
    match imp.capabilities().order {
        IterationOrder::Unspecified => {
            let mut a = original_items.clone();
            let mut b = copied_items.clone();
            a.sort();
            b.sort();
            ensure_eq!(a, b);
        }
        _ => ensure_eq!(copied_items, original_items, "round trip changed iteration order"),
    }
    for element in &inserted {
        ensure!(copy.contains(Some(element)), "{element} lost in round trip");
    }

    cx.log().debug("checking the copies are independent");
    ensure!(copy.remove(Some(&inserted[0])));
    ensure!(original.contains(Some(&inserted[0])));
    ensure_matches!(original.add(Some(item_for(-5))), Ok(true));
    ensure!(!copy.contains(Some(&item_for(-5))));
    Ok(())
}

fn negative_elements<D: CollectionImplementation>(imp: &D, _cx: &TestCx) -> TestOutcome {
    let collection = imp.empty_collection();
    let inserted: Vec<D::Elem> = negative_seq_items(SIZE);
    fill(&collection, &inserted)?;
    ensure_eq!(collection.len(), SIZE);

    let iterated = present(&collection.to_vec());
    check_order(imp.capabilities().order, &inserted, &iterated)?;
    if imp.capabilities().order == IterationOrder::Sorted {
        ensure_eq!(iterated.first().map(|e| e.index()), Some(1 - SIZE as i32));
        ensure_eq!(iterated.last().map(|e| e.index()), Some(0));
    }
    Ok(())
}

fn concurrent_adds<D: CollectionImplementation>(imp: &D, cx: &TestCx) -> TestOutcome {
    const THREADS: i32 = 4;

    if !imp.capabilities().concurrent {
        cx.skip("not declared concurrent");
        return Ok(());
    }

    let collection = Arc::new(imp.empty_collection());
    let threads: Vec<_> = (0..THREADS)
        .map(|t| {
            let collection = Arc::clone(&collection);
            cx.spawn(&format!("adder-{t}"), move |_| {
                for i in 0..SIZE as i32 {
                    let element: D::Elem = item_for(t * SIZE as i32 + i);
                    ensure_matches!(collection.add(Some(element)), Ok(true));
                }
                Ok(())
            })
        })
        .collect();
    for thread in threads {
        cx.await_termination(thread)?;
    }

    ensure_eq!(collection.len(), THREADS as usize * SIZE);
    for index in 0..THREADS * SIZE as i32 {
        ensure!(collection.contains(Some(&item_for(index))), "{index} lost");
    }
    Ok(())
}
