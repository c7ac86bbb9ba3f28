//! Synchronization helpers used to sequence test threads.
//!
//! These primitives are harness infrastructure, not subjects under test:
//!
//! - [`CountDownLatch`]: "the auxiliary thread has reached point X" gates
//! - [`Interrupt`]: a per-thread cancellation handle passed to blocking calls
//! - [`AuxThread`]: a tracked helper thread joined with a bounded wait
//!
//! Every wait in this module is bounded. A wait that runs out its bound is
//! reported as a liveness [`Failure`](crate::error::Failure), never a hang.

mod interrupt;
mod latch;
mod thread;

pub use interrupt::Interrupt;
pub use latch::CountDownLatch;
pub use thread::{AuxThread, ThreadTracker};
