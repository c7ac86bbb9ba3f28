//! Map descriptors: `HashMap`, `BTreeMap`, `IndexMap` and a read-write-locked
//! map that refuses in-place mutation.

use std::collections::{BTreeMap, HashMap};

use contract_tck::descriptor::Descriptor;
use contract_tck::{
    Capabilities, ContainerError, Element, IterationOrder, Item, MapImplementation, MapUnderTest,
    SharedItem,
};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::json_round_trip;

type Entries<E> = Vec<(Option<E>, Option<E>)>;

/// Null keys are not valid JSON object keys, so maps travel as entry lists.
fn round_trip_entries<E: Element>(entries: &Entries<E>) -> Result<Entries<E>, ContainerError> {
    json_round_trip(entries)
}

/// A hash map admitting a null key and null values.
#[derive(Debug)]
pub struct LockedHashMap<E>(Mutex<HashMap<Option<E>, Option<E>>>);

impl<E> Default for LockedHashMap<E> {
    fn default() -> Self {
        Self(Mutex::default())
    }
}

impl<E: Element> MapUnderTest<E> for LockedHashMap<E> {
    fn put(&self, key: Option<E>, value: Option<E>) -> Result<Option<Option<E>>, ContainerError> {
        Ok(self.0.lock().insert(key, value))
    }

    fn put_if_absent(
        &self,
        key: Option<E>,
        value: Option<E>,
    ) -> Result<Option<Option<E>>, ContainerError> {
        let mut map = self.0.lock();
        if let Some(existing) = map.get(&key) {
            return Ok(Some(existing.clone()));
        }
        map.insert(key, value);
        Ok(None)
    }

    fn get(&self, key: Option<&E>) -> Option<Option<E>> {
        self.0.lock().get(&key.cloned()).cloned()
    }

    fn contains_key(&self, key: Option<&E>) -> bool {
        self.0.lock().contains_key(&key.cloned())
    }

    fn contains_value(&self, value: Option<&E>) -> bool {
        self.0.lock().values().any(|v| v.as_ref() == value)
    }

    fn remove(&self, key: Option<&E>) -> Option<Option<E>> {
        self.0.lock().remove(&key.cloned())
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn entries(&self) -> Entries<E> {
        self.0
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn update_values(
        &self,
        update: &mut dyn FnMut(Option<&E>, &mut Option<E>),
    ) -> Result<(), ContainerError> {
        for (key, value) in self.0.lock().iter_mut() {
            update(key.as_ref(), value);
        }
        Ok(())
    }

    fn serial_clone(&self) -> Result<Self, ContainerError> {
        let entries = round_trip_entries(&self.entries())?;
        Ok(Self(Mutex::new(entries.into_iter().collect())))
    }
}

/// `HashMap<Option<SharedItem>, Option<SharedItem>>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashMapImpl;

impl Descriptor for HashMapImpl {
    fn name(&self) -> &str {
        "hash-map"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .null_keys()
            .null_values()
            .mutable_entries()
            .serializable()
    }
}

impl MapImplementation for HashMapImpl {
    type Elem = SharedItem;
    type Map = LockedHashMap<SharedItem>;

    fn empty_map(&self) -> Self::Map {
        LockedHashMap::default()
    }
}

/// A sorted map; keys must be present, values may be null.
#[derive(Debug)]
pub struct LockedBTreeMap<E>(Mutex<BTreeMap<E, Option<E>>>);

impl<E> Default for LockedBTreeMap<E> {
    fn default() -> Self {
        Self(Mutex::default())
    }
}

impl<E: Element> MapUnderTest<E> for LockedBTreeMap<E> {
    fn put(&self, key: Option<E>, value: Option<E>) -> Result<Option<Option<E>>, ContainerError> {
        let key = key.ok_or(ContainerError::NullElement)?;
        Ok(self.0.lock().insert(key, value))
    }

    fn put_if_absent(
        &self,
        key: Option<E>,
        value: Option<E>,
    ) -> Result<Option<Option<E>>, ContainerError> {
        let key = key.ok_or(ContainerError::NullElement)?;
        let mut map = self.0.lock();
        if let Some(existing) = map.get(&key) {
            return Ok(Some(existing.clone()));
        }
        map.insert(key, value);
        Ok(None)
    }

    fn get(&self, key: Option<&E>) -> Option<Option<E>> {
        key.and_then(|k| self.0.lock().get(k).cloned())
    }

    fn contains_key(&self, key: Option<&E>) -> bool {
        key.is_some_and(|k| self.0.lock().contains_key(k))
    }

    fn contains_value(&self, value: Option<&E>) -> bool {
        self.0.lock().values().any(|v| v.as_ref() == value)
    }

    fn remove(&self, key: Option<&E>) -> Option<Option<E>> {
        key.and_then(|k| self.0.lock().remove(k))
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn entries(&self) -> Entries<E> {
        self.0
            .lock()
            .iter()
            .map(|(k, v)| (Some(k.clone()), v.clone()))
            .collect()
    }

    fn update_values(
        &self,
        update: &mut dyn FnMut(Option<&E>, &mut Option<E>),
    ) -> Result<(), ContainerError> {
        for (key, value) in self.0.lock().iter_mut() {
            update(Some(key), value);
        }
        Ok(())
    }

    fn serial_clone(&self) -> Result<Self, ContainerError> {
        let map = json_round_trip(&*self.0.lock())?;
        Ok(Self(Mutex::new(map)))
    }
}

/// `BTreeMap<Item, Option<Item>>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct BTreeMapImpl;

impl Descriptor for BTreeMapImpl {
    fn name(&self) -> &str {
        "btree-map"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .null_values()
            .mutable_entries()
            .order(IterationOrder::Sorted)
            .serializable()
    }
}

impl MapImplementation for BTreeMapImpl {
    type Elem = Item;
    type Map = LockedBTreeMap<Item>;

    fn empty_map(&self) -> Self::Map {
        LockedBTreeMap::default()
    }
}

/// An insertion-ordered map admitting a null key and null values.
#[derive(Debug)]
pub struct LockedIndexMap<E>(Mutex<IndexMap<Option<E>, Option<E>>>);

impl<E> Default for LockedIndexMap<E> {
    fn default() -> Self {
        Self(Mutex::new(IndexMap::new()))
    }
}

impl<E: Element> MapUnderTest<E> for LockedIndexMap<E> {
    fn put(&self, key: Option<E>, value: Option<E>) -> Result<Option<Option<E>>, ContainerError> {
        Ok(self.0.lock().insert(key, value))
    }

    fn put_if_absent(
        &self,
        key: Option<E>,
        value: Option<E>,
    ) -> Result<Option<Option<E>>, ContainerError> {
        let mut map = self.0.lock();
        if let Some(existing) = map.get(&key) {
            return Ok(Some(existing.clone()));
        }
        map.insert(key, value);
        Ok(None)
    }

    fn get(&self, key: Option<&E>) -> Option<Option<E>> {
        self.0.lock().get(&key.cloned()).cloned()
    }

    fn contains_key(&self, key: Option<&E>) -> bool {
        self.0.lock().contains_key(&key.cloned())
    }

    fn contains_value(&self, value: Option<&E>) -> bool {
        self.0.lock().values().any(|v| v.as_ref() == value)
    }

    fn remove(&self, key: Option<&E>) -> Option<Option<E>> {
        self.0.lock().shift_remove(&key.cloned())
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn entries(&self) -> Entries<E> {
        self.0
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn update_values(
        &self,
        update: &mut dyn FnMut(Option<&E>, &mut Option<E>),
    ) -> Result<(), ContainerError> {
        for (key, value) in self.0.lock().iter_mut() {
            update(key.as_ref(), value);
        }
        Ok(())
    }

    fn serial_clone(&self) -> Result<Self, ContainerError> {
        let entries = round_trip_entries(&self.entries())?;
        Ok(Self(Mutex::new(entries.into_iter().collect())))
    }
}

/// `IndexMap<Option<SharedItem>, Option<SharedItem>>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexMapImpl;

impl Descriptor for IndexMapImpl {
    fn name(&self) -> &str {
        "index-map"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .null_keys()
            .null_values()
            .mutable_entries()
            .order(IterationOrder::Insertion)
            .serializable()
    }
}

impl MapImplementation for IndexMapImpl {
    type Elem = SharedItem;
    type Map = LockedIndexMap<SharedItem>;

    fn empty_map(&self) -> Self::Map {
        LockedIndexMap::default()
    }
}

/// A concurrent map in the style of lock-striped hash maps: no nulls, and
/// entries are snapshots that cannot be written through.
#[derive(Debug)]
pub struct RwLockMap<E>(RwLock<HashMap<E, E>>);

impl<E> Default for RwLockMap<E> {
    fn default() -> Self {
        Self(RwLock::default())
    }
}

impl<E: Element> MapUnderTest<E> for RwLockMap<E> {
    fn put(&self, key: Option<E>, value: Option<E>) -> Result<Option<Option<E>>, ContainerError> {
        let (Some(key), Some(value)) = (key, value) else {
            return Err(ContainerError::NullElement);
        };
        Ok(self.0.write().insert(key, value).map(Some))
    }

    fn put_if_absent(
        &self,
        key: Option<E>,
        value: Option<E>,
    ) -> Result<Option<Option<E>>, ContainerError> {
        let (Some(key), Some(value)) = (key, value) else {
            return Err(ContainerError::NullElement);
        };
        let mut map = self.0.write();
        if let Some(existing) = map.get(&key) {
            return Ok(Some(Some(existing.clone())));
        }
        map.insert(key, value);
        Ok(None)
    }

    fn get(&self, key: Option<&E>) -> Option<Option<E>> {
        key.and_then(|k| self.0.read().get(k).cloned().map(Some))
    }

    fn contains_key(&self, key: Option<&E>) -> bool {
        key.is_some_and(|k| self.0.read().contains_key(k))
    }

    fn contains_value(&self, value: Option<&E>) -> bool {
        value.is_some_and(|v| self.0.read().values().any(|x| x == v))
    }

    fn remove(&self, key: Option<&E>) -> Option<Option<E>> {
        key.and_then(|k| self.0.write().remove(k).map(Some))
    }

    fn len(&self) -> usize {
        self.0.read().len()
    }

    fn clear(&self) {
        self.0.write().clear();
    }

    fn entries(&self) -> Entries<E> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (Some(k.clone()), Some(v.clone())))
            .collect()
    }

    fn update_values(
        &self,
        _update: &mut dyn FnMut(Option<&E>, &mut Option<E>),
    ) -> Result<(), ContainerError> {
        Err(ContainerError::Unsupported)
    }
}

/// `HashMap<SharedItem, SharedItem>` behind a read-write lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RwLockMapImpl;

impl Descriptor for RwLockMapImpl {
    fn name(&self) -> &str {
        "rwlock-map"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl MapImplementation for RwLockMapImpl {
    type Elem = SharedItem;
    type Map = RwLockMap<SharedItem>;

    fn empty_map(&self) -> Self::Map {
        RwLockMap::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_key_survives_serial_clone() {
        let map = HashMapImpl.empty_map();
        map.put(None, Some(SharedItem::from_index(1))).unwrap();
        map.put(Some(SharedItem::from_index(2)), None).unwrap();
        let copy = map.serial_clone().unwrap();
        assert_eq!(copy.get(None), Some(Some(SharedItem::from_index(1))));
        assert_eq!(copy.get(Some(&SharedItem::from_index(2))), Some(None));
    }

    #[test]
    fn rwlock_map_rejects_nulls_and_mutation() {
        let map = RwLockMapImpl.empty_map();
        assert_eq!(
            map.put(None, Some(SharedItem::from_index(1))),
            Err(ContainerError::NullElement)
        );
        assert_eq!(
            map.put(Some(SharedItem::from_index(1)), None),
            Err(ContainerError::NullElement)
        );
        assert_eq!(
            map.update_values(&mut |_, value| *value = None),
            Err(ContainerError::Unsupported)
        );
    }

    #[test]
    fn index_map_preserves_insertion_order() {
        let map = IndexMapImpl.empty_map();
        for i in [5, 1, 3] {
            map.put(Some(SharedItem::from_index(i)), None).unwrap();
        }
        map.remove(Some(&SharedItem::from_index(1)));
        let keys: Vec<i32> = map
            .entries()
            .into_iter()
            .filter_map(|(k, _)| k.map(|k| k.index()))
            .collect();
        assert_eq!(keys, vec![5, 3]);
    }

    #[test]
    fn wrappers_default_without_element_default() {
        assert!(LockedHashMap::<Item>::default().is_empty());
        assert!(LockedBTreeMap::<Item>::default().is_empty());
        assert!(RwLockMap::<SharedItem>::default().is_empty());
        assert!(BTreeMapImpl.empty_map().is_empty());
        assert!(IndexMapImpl.empty_map().is_empty());
    }
}
