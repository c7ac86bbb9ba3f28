//! Contract suites bound to concrete containers.
//!
//! The kit in `contract-tck` knows nothing about any particular container.
//! This crate supplies the descriptors for the containers we actually ship
//! against (`std`, `crossbeam-queue`, `indexmap`) and composes them into the
//! default [`Registry`] that the `tck` binary runs.
//!
//! # Implementations
//!
//! | suite            | implementations                                               |
//! |------------------|---------------------------------------------------------------|
//! | `collection`     | `vec`, `btree-set`, `hash-set`, `index-set`                   |
//! | `map`            | `hash-map`, `btree-map`, `index-map`, `rwlock-map`            |
//! | `queue`          | `vec-deque`, `seg-queue`, `array-queue`                       |
//! | `blocking_queue` | `sync-channel`, `sync-channel-1`, `rendezvous`, `channel`, `condvar-queue` |
//! | `latch`          | `count-down-latch`, `parking-latch`                           |
//! | `exchanger`      | `slot-exchanger`                                              |
//! | platform suites  | `std`                                                         |

#![forbid(unsafe_code)]

pub mod impls;

use contract_tck::contracts::platform::{exchanger, latch};
use contract_tck::contracts::{self, blocking_queue, collection, map, queue};
use contract_tck::descriptor::Descriptor;
use contract_tck::{Platform, Registry};

use impls::channels::{ChannelQueueImpl, CondvarQueueImpl};
use impls::collections::{BTreeSetImpl, HashSetImpl, IndexSetImpl, VecImpl};
use impls::maps::{BTreeMapImpl, HashMapImpl, IndexMapImpl, RwLockMapImpl};
use impls::queues::{ArrayQueueImpl, SegQueueImpl, VecDequeImpl};
use impls::synchronizers::{CountDownLatchImpl, ParkingLatchImpl, SlotExchangerImpl};

/// Binds the collection contract to every collection descriptor.
pub fn bind_collections(registry: &mut Registry) {
    registry
        .bind(collection::contract(), VecImpl)
        .bind(collection::contract(), BTreeSetImpl)
        .bind(collection::contract(), HashSetImpl)
        .bind(collection::contract(), IndexSetImpl);
}

/// Binds the map contract to every map descriptor.
pub fn bind_maps(registry: &mut Registry) {
    registry
        .bind(map::contract(), HashMapImpl)
        .bind(map::contract(), BTreeMapImpl)
        .bind(map::contract(), IndexMapImpl)
        .bind(map::contract(), RwLockMapImpl);
}

/// Binds the queue contract to every non-blocking queue descriptor.
pub fn bind_queues(registry: &mut Registry) {
    registry
        .bind(queue::contract(), VecDequeImpl)
        .bind(queue::contract(), SegQueueImpl)
        .bind(queue::contract(), ArrayQueueImpl);
}

/// Binds the blocking queue contract to every blocking queue descriptor.
pub fn bind_blocking_queues(registry: &mut Registry) {
    for descriptor in ChannelQueueImpl::all() {
        registry.bind(blocking_queue::contract(), descriptor);
    }
    registry.bind(blocking_queue::contract(), CondvarQueueImpl);
}

/// Binds the latch and exchanger contracts to their descriptors.
pub fn bind_synchronizers(registry: &mut Registry) {
    registry
        .bind(latch::contract(), CountDownLatchImpl)
        .bind(latch::contract(), ParkingLatchImpl)
        .bind(exchanger::contract(), SlotExchangerImpl);
}

/// Every suite bound to every implementation, in a fixed order.
#[must_use]
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    bind_collections(&mut registry);
    bind_maps(&mut registry);
    bind_queues(&mut registry);
    bind_blocking_queues(&mut registry);
    bind_synchronizers(&mut registry);
    contracts::platform::bind_all(&mut registry, Platform);
    tracing::debug!(
        suites = registry.suites().len(),
        tests = registry.len(),
        "default registry composed"
    );
    registry
}

/// Names of every implementation in `registry`, deduplicated, in order.
#[must_use]
pub fn implementation_names(registry: &Registry) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for suite in registry.suites() {
        for name in suite.implementations() {
            if !names.iter().any(|n| n.as_str() == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_suite_is_bound() {
        let registry = default_registry();
        for suite in [
            collection::SUITE,
            map::SUITE,
            queue::SUITE,
            blocking_queue::SUITE,
            latch::SUITE,
            exchanger::SUITE,
            contracts::platform::tasks::SUITE,
        ] {
            assert!(registry.suite(suite).is_some(), "{suite} missing");
        }
        let names = implementation_names(&registry);
        assert!(names.contains(&"rendezvous".to_string()));
        assert!(names.contains(&Platform.name().to_string()));
    }

    #[test]
    fn test_names_are_unique() {
        let registry = default_registry();
        let mut names = registry.test_names();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, registry.len());
    }
}
