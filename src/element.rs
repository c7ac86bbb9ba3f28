//! Test elements.
//!
//! Contracts never construct container entries directly; they ask an
//! [`Element`] factory for the element at an integer index. Elements order by
//! their index, are equal iff their indices are equal, and render the decimal
//! index as their only string form.
//!
//! Two factories are provided:
//!
//! - [`Item`]: a `Copy` newtype whose identity is its value.
//! - [`SharedItem`]: heap-allocated; indices in `0..SIZE` are interned, so the
//!   element a container hands back can be checked for pointer identity with
//!   the one that was inserted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

/// Number of elements placed in collections by default. At least ten.
pub const SIZE: usize = 32;

/// An immutable, integer-indexed test element.
pub trait Element:
    Clone + Ord + Hash + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Returns the element for `index`.
    fn from_index(index: i32) -> Self;

    /// Returns this element's index.
    fn index(&self) -> i32;

    /// Returns true if `other` is the very same element, not merely an equal one.
    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

/// Value-identity test element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(i32);

impl Item {
    /// Creates the element for `value`.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the index this element was created from.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Element for Item {
    fn from_index(index: i32) -> Self {
        Self(index)
    }

    fn index(&self) -> i32 {
        self.0
    }
}

/// Reference-identity test element.
///
/// Equality, ordering, and hashing all go through the index; [`Element::is_same`]
/// compares allocations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedItem(Arc<Item>);

fn interned() -> &'static [SharedItem] {
    static CACHE: OnceLock<Vec<SharedItem>> = OnceLock::new();
    CACHE.get_or_init(|| {
        (0..SIZE as i32)
            .map(|i| SharedItem(Arc::new(Item(i))))
            .collect()
    })
}

impl SharedItem {
    /// Allocates a fresh element that is equal to, but not the same as, any
    /// interned one.
    #[must_use]
    pub fn fresh(index: i32) -> Self {
        Self(Arc::new(Item(index)))
    }
}

impl fmt::Display for SharedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl Element for SharedItem {
    fn from_index(index: i32) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| interned().get(i))
            .cloned()
            .unwrap_or_else(|| Self::fresh(index))
    }

    fn index(&self) -> i32 {
        self.0.value()
    }

    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Returns the element for `index` (the `itemFor` helper of every contract).
#[must_use]
pub fn item_for<E: Element>(index: i32) -> E {
    E::from_index(index)
}

/// Elements `0, 1, .., n - 1`.
#[must_use]
pub fn seq_items<E: Element>(n: usize) -> Vec<E> {
    (0..n as i32).map(E::from_index).collect()
}

/// Elements `0, -1, .., -(n - 1)`.
#[must_use]
pub fn negative_seq_items<E: Element>(n: usize) -> Vec<E> {
    (0..n as i32).map(|i| E::from_index(-i)).collect()
}

/// A fixed permutation of `0..n`.
///
/// Deterministic so that failures reproduce; far enough from sorted order
/// that an implementation sorting its contents is caught.
#[must_use]
pub fn shuffled_indices(n: usize) -> Vec<i32> {
    let n = n as i32;
    if n == 0 {
        return Vec::new();
    }
    let stride = (1..)
        .map(|k| 2 * k + 5)
        .find(|s| gcd(*s, n) == 1)
        .unwrap_or(1);
    (0..n).map(|i| (i * stride + n / 2) % n).collect()
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_renders_decimal_index() {
        assert_eq!(Item::new(7).to_string(), "7");
        assert_eq!(Item::new(-12).to_string(), "-12");
        assert_eq!(SharedItem::from_index(3).to_string(), "3");
    }

    #[test]
    fn shared_items_are_interned_in_range() {
        let a = SharedItem::from_index(5);
        let b = SharedItem::from_index(5);
        assert!(a.is_same(&b));

        let c = SharedItem::fresh(5);
        assert_eq!(a, c);
        assert!(!a.is_same(&c));

        let out_of_range = SharedItem::from_index(SIZE as i32 + 10);
        assert!(!out_of_range.is_same(&SharedItem::from_index(SIZE as i32 + 10)));
    }

    #[test]
    fn sequences() {
        let items: Vec<Item> = seq_items(4);
        assert_eq!(items, vec![Item(0), Item(1), Item(2), Item(3)]);
        let negative: Vec<Item> = negative_seq_items(3);
        assert_eq!(negative, vec![Item(0), Item(-1), Item(-2)]);
    }

    #[test]
    fn shuffled_indices_is_a_permutation() {
        for n in [1, 2, 10, SIZE] {
            let mut indices = shuffled_indices(n);
            assert_eq!(indices.len(), n);
            indices.sort_unstable();
            assert_eq!(indices, (0..n as i32).collect::<Vec<_>>());
        }
        let shuffled = shuffled_indices(SIZE);
        assert_ne!(shuffled, (0..SIZE as i32).collect::<Vec<_>>());
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&SharedItem::from_index(9)).unwrap();
        assert_eq!(json, "9");
        let back: SharedItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index(), 9);
    }
}
