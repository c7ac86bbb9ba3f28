//! Property tests for the element factories.

#[macro_use]
mod common;

use contract_tck::element::{Element, Item, SharedItem, shuffled_indices};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn order_follows_index(a in any::<i32>(), b in any::<i32>()) {
        let (x, y) = (Item::from_index(a), Item::from_index(b));
        prop_assert_eq!(x.cmp(&y), a.cmp(&b));
        prop_assert_eq!(x == y, a == b);

        let (sx, sy) = (SharedItem::from_index(a), SharedItem::from_index(b));
        prop_assert_eq!(sx.cmp(&sy), a.cmp(&b));
        prop_assert_eq!(sx == sy, a == b);
    }

    #[test]
    fn display_is_decimal_index(index in any::<i32>()) {
        prop_assert_eq!(Item::from_index(index).to_string(), index.to_string());
        prop_assert_eq!(SharedItem::from_index(index).to_string(), index.to_string());
        prop_assert_eq!(SharedItem::from_index(index).index(), index);
    }

    #[test]
    fn fresh_shared_items_are_equal_but_not_same(index in 0i32..64) {
        let interned = SharedItem::from_index(index);
        let fresh = SharedItem::fresh(index);
        prop_assert_eq!(&interned, &fresh);
        prop_assert!(!interned.is_same(&fresh));
        prop_assert!(interned.is_same(&interned.clone()));
    }

    #[test]
    fn shuffle_is_permutation(n in 0usize..200) {
        let mut indices = shuffled_indices(n);
        prop_assert_eq!(indices.len(), n);
        indices.sort_unstable();
        prop_assert_eq!(indices, (0..n as i32).collect::<Vec<_>>());
    }
}

/// ELEM-001: the interned range hands back the same allocation every time.
#[test]
fn elem_001_interned_identity() {
    common::init_test_logging();
    test_phase!("ELEM-001 interned identity");

    let first: Vec<SharedItem> = (0..contract_tck::SIZE as i32).map(SharedItem::from_index).collect();
    let again: Vec<SharedItem> = (0..contract_tck::SIZE as i32).map(SharedItem::from_index).collect();
    let same = first.iter().zip(&again).filter(|(a, b)| a.is_same(b)).count();
    assert_with_log!(same == contract_tck::SIZE, "interned identity", contract_tck::SIZE, same);

    test_complete!("elem_001_interned_identity", checked = same);
}
