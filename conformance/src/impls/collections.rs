//! Collection descriptors: `Vec`, `BTreeSet`, `HashSet` and `IndexSet`.

use std::collections::{BTreeSet, HashSet};

use contract_tck::descriptor::Descriptor;
use contract_tck::{
    Capabilities, CollectionImplementation, CollectionUnderTest, ContainerError, Element,
    IterationOrder, Item, SharedItem,
};
use indexmap::IndexSet;
use parking_lot::Mutex;

use super::json_round_trip;

/// A growable list: insertion order, duplicates and nulls allowed.
#[derive(Debug)]
pub struct LockedVec<E>(Mutex<Vec<Option<E>>>);

impl<E> Default for LockedVec<E> {
    fn default() -> Self {
        Self(Mutex::default())
    }
}

impl<E: Element> CollectionUnderTest<E> for LockedVec<E> {
    fn add(&self, element: Option<E>) -> Result<bool, ContainerError> {
        self.0.lock().push(element);
        Ok(true)
    }

    fn contains(&self, element: Option<&E>) -> bool {
        self.0.lock().iter().any(|e| e.as_ref() == element)
    }

    fn remove(&self, element: Option<&E>) -> bool {
        let mut items = self.0.lock();
        match items.iter().position(|e| e.as_ref() == element) {
            Some(at) => {
                items.remove(at);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn to_vec(&self) -> Vec<Option<E>> {
        self.0.lock().clone()
    }

    fn retain(&self, keep: &mut dyn FnMut(Option<&E>) -> bool) {
        self.0.lock().retain(|e| keep(e.as_ref()));
    }

    fn serial_clone(&self) -> Result<Self, ContainerError> {
        let items = json_round_trip(&*self.0.lock())?;
        Ok(Self(Mutex::new(items)))
    }
}

/// `Vec<Option<SharedItem>>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct VecImpl;

impl Descriptor for VecImpl {
    fn name(&self) -> &str {
        "vec"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .null_keys()
            .duplicates()
            .order(IterationOrder::Insertion)
            .serializable()
    }
}

impl CollectionImplementation for VecImpl {
    type Elem = SharedItem;
    type Collection = LockedVec<SharedItem>;

    fn empty_collection(&self) -> Self::Collection {
        LockedVec::default()
    }
}

/// A sorted set; nulls have no place in the ordering and are rejected.
#[derive(Debug)]
pub struct LockedBTreeSet<E>(Mutex<BTreeSet<E>>);

impl<E> Default for LockedBTreeSet<E> {
    fn default() -> Self {
        Self(Mutex::default())
    }
}

impl<E: Element> CollectionUnderTest<E> for LockedBTreeSet<E> {
    fn add(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        Ok(self.0.lock().insert(element))
    }

    fn contains(&self, element: Option<&E>) -> bool {
        element.is_some_and(|e| self.0.lock().contains(e))
    }

    fn remove(&self, element: Option<&E>) -> bool {
        element.is_some_and(|e| self.0.lock().remove(e))
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn to_vec(&self) -> Vec<Option<E>> {
        self.0.lock().iter().cloned().map(Some).collect()
    }

    fn retain(&self, keep: &mut dyn FnMut(Option<&E>) -> bool) {
        self.0.lock().retain(|e| keep(Some(e)));
    }

    fn serial_clone(&self) -> Result<Self, ContainerError> {
        let items = json_round_trip(&*self.0.lock())?;
        Ok(Self(Mutex::new(items)))
    }
}

/// `BTreeSet<Item>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct BTreeSetImpl;

impl Descriptor for BTreeSetImpl {
    fn name(&self) -> &str {
        "btree-set"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .order(IterationOrder::Sorted)
            .serializable()
    }
}

impl CollectionImplementation for BTreeSetImpl {
    type Elem = Item;
    type Collection = LockedBTreeSet<Item>;

    fn empty_collection(&self) -> Self::Collection {
        LockedBTreeSet::default()
    }
}

/// A hash set shared between threads.
#[derive(Debug)]
pub struct LockedHashSet<E>(Mutex<HashSet<E>>);

impl<E> Default for LockedHashSet<E> {
    fn default() -> Self {
        Self(Mutex::default())
    }
}

impl<E: Element> CollectionUnderTest<E> for LockedHashSet<E> {
    fn add(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        Ok(self.0.lock().insert(element))
    }

    fn contains(&self, element: Option<&E>) -> bool {
        element.is_some_and(|e| self.0.lock().contains(e))
    }

    fn remove(&self, element: Option<&E>) -> bool {
        element.is_some_and(|e| self.0.lock().remove(e))
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn to_vec(&self) -> Vec<Option<E>> {
        self.0.lock().iter().cloned().map(Some).collect()
    }

    fn retain(&self, keep: &mut dyn FnMut(Option<&E>) -> bool) {
        self.0.lock().retain(|e| keep(Some(e)));
    }
}

/// `HashSet<SharedItem>` behind a mutex; declared concurrent, not serializable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSetImpl;

impl Descriptor for HashSetImpl {
    fn name(&self) -> &str {
        "hash-set"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl CollectionImplementation for HashSetImpl {
    type Elem = SharedItem;
    type Collection = LockedHashSet<SharedItem>;

    fn empty_collection(&self) -> Self::Collection {
        LockedHashSet::default()
    }
}

/// An insertion-ordered set that admits one null.
#[derive(Debug)]
pub struct LockedIndexSet<E>(Mutex<IndexSet<Option<E>>>);

impl<E> Default for LockedIndexSet<E> {
    fn default() -> Self {
        Self(Mutex::new(IndexSet::new()))
    }
}

impl<E: Element> CollectionUnderTest<E> for LockedIndexSet<E> {
    fn add(&self, element: Option<E>) -> Result<bool, ContainerError> {
        Ok(self.0.lock().insert(element))
    }

    fn contains(&self, element: Option<&E>) -> bool {
        self.0.lock().contains(&element.cloned())
    }

    fn remove(&self, element: Option<&E>) -> bool {
        // shift_remove keeps the insertion order of the remaining elements
        self.0.lock().shift_remove(&element.cloned())
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn to_vec(&self) -> Vec<Option<E>> {
        self.0.lock().iter().cloned().collect()
    }

    fn retain(&self, keep: &mut dyn FnMut(Option<&E>) -> bool) {
        self.0.lock().retain(|e| keep(e.as_ref()));
    }

    fn serial_clone(&self) -> Result<Self, ContainerError> {
        let items = json_round_trip(&*self.0.lock())?;
        Ok(Self(Mutex::new(items)))
    }
}

/// `IndexSet<Option<SharedItem>>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSetImpl;

impl Descriptor for IndexSetImpl {
    fn name(&self) -> &str {
        "index-set"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .null_keys()
            .order(IterationOrder::Insertion)
            .serializable()
    }
}

impl CollectionImplementation for IndexSetImpl {
    type Elem = SharedItem;
    type Collection = LockedIndexSet<SharedItem>;

    fn empty_collection(&self) -> Self::Collection {
        LockedIndexSet::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_removes_first_occurrence_only() {
        let list = VecImpl.empty_collection();
        let a = SharedItem::from_index(1);
        list.add(Some(a.clone())).unwrap();
        list.add(None).unwrap();
        list.add(Some(a.clone())).unwrap();
        assert!(list.remove(Some(&a)));
        assert_eq!(list.to_vec(), vec![None, Some(a)]);
    }

    #[test]
    fn index_set_keeps_order_after_remove() {
        let set = IndexSetImpl.empty_collection();
        for i in [3, 1, 2] {
            set.add(Some(SharedItem::from_index(i))).unwrap();
        }
        assert!(set.remove(Some(&SharedItem::from_index(3))));
        let order: Vec<i32> = set.to_vec().into_iter().flatten().map(|e| e.index()).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn btree_set_rejects_null() {
        let set = BTreeSetImpl.empty_collection();
        assert_eq!(set.add(None), Err(ContainerError::NullElement));
        assert!(set.is_empty());
    }

    #[test]
    fn wrappers_default_without_element_default() {
        assert!(LockedVec::<Item>::default().is_empty());
        assert!(LockedBTreeSet::<Item>::default().is_empty());
        assert!(LockedHashSet::<SharedItem>::default().is_empty());
        assert!(LockedIndexSet::<SharedItem>::default().is_empty());
        assert!(BTreeSetImpl.empty_collection().is_empty());
        assert!(HashSetImpl.empty_collection().is_empty());
    }
}
