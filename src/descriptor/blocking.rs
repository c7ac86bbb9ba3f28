use std::time::Duration;

use super::Descriptor;
use crate::element::Element;
use crate::error::ContainerError;
use crate::sync::Interrupt;

/// A blocking queue being validated.
///
/// Every operation that can wait takes the calling thread's [`Interrupt`] and
/// returns [`ContainerError::Interrupted`] when it observes a pending
/// interrupt, whether the interrupt arrived before or during the wait. The
/// implementation consumes the interrupt it reports.
pub trait BlockingQueueUnderTest<E>: Send + Sync {
    /// Inserts without waiting; `Ok(false)` when no space (or no taker) is available.
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError>;

    /// Inserts, waiting up to `timeout` for space; `Ok(false)` on timeout.
    fn offer_timeout(
        &self,
        element: Option<E>,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError>;

    /// Inserts, waiting as long as necessary for space.
    fn put(&self, element: Option<E>, interrupt: &Interrupt) -> Result<(), ContainerError>;

    /// Removes the head without waiting.
    fn poll(&self) -> Option<E>;

    /// Removes the head, waiting up to `timeout`; `Ok(None)` on timeout.
    fn poll_timeout(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError>;

    /// Removes the head, waiting as long as necessary.
    fn take(&self, interrupt: &Interrupt) -> Result<E, ContainerError>;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots, or `None` when unbounded.
    fn remaining_capacity(&self) -> Option<usize>;

    /// Moves up to `max` elements into `sink` in FIFO order; returns how many.
    fn drain_to(&self, sink: &mut Vec<E>, max: usize) -> usize;
}

/// Descriptor for a blocking queue implementation.
pub trait BlockingQueueImplementation: Descriptor {
    /// Element type.
    type Elem: Element;
    /// Concrete container.
    type Queue: BlockingQueueUnderTest<Self::Elem> + 'static;

    /// A new, empty queue. Distinct on every call.
    fn empty_queue(&self) -> Self::Queue;

    /// Capacity of the queues handed out; `None` when unbounded.
    fn capacity(&self) -> Option<usize>;
}
