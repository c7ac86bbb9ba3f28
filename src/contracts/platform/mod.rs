//! Contracts for platform primitives.
//!
//! Most of these bind to the [`Platform`](crate::descriptor::Platform)
//! descriptor and exercise `std` directly: atomics, park/unpark, thread-local
//! storage, barriers, one-time initialization and spawned tasks.
//!
//! [`latch`] and [`exchanger`] validate synchronizers that `std` does not
//! ship, so they bind to their own descriptor traits like the container
//! contracts do.

pub mod atomics;
pub mod barrier;
pub mod exchanger;
pub mod latch;
pub mod lock_support;
pub mod once;
pub mod tasks;
pub mod thread_local;

use crate::descriptor::Descriptor;
use crate::registry::Registry;

/// Binds every contract that needs no implementation of its own to `descriptor`.
pub fn bind_all<D: Descriptor + Clone>(registry: &mut Registry, descriptor: D) {
    registry
        .bind(atomics::contract(), descriptor.clone())
        .bind(lock_support::contract(), descriptor.clone())
        .bind(thread_local::contract(), descriptor.clone())
        .bind(barrier::contract(), descriptor.clone())
        .bind(once::contract(), descriptor.clone())
        .bind(tasks::contract(), descriptor);
}
