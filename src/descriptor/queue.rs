use super::Descriptor;
use crate::element::Element;
use crate::error::ContainerError;

/// A non-blocking FIFO queue being validated.
pub trait QueueUnderTest<E>: Send + Sync {
    /// Inserts at the tail; `Ok(false)` when the queue is at capacity.
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError>;

    /// Removes the head, if any.
    fn poll(&self) -> Option<E>;

    /// Returns the head without removing it.
    fn peek(&self) -> Result<Option<E>, ContainerError>;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the queue is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity, or `None` when unbounded.
    fn capacity(&self) -> Option<usize>;
}

/// Descriptor for a queue implementation.
pub trait QueueImplementation: Descriptor {
    /// Element type.
    type Elem: Element;
    /// Concrete container.
    type Queue: QueueUnderTest<Self::Elem> + 'static;

    /// A new, empty queue. Distinct on every call.
    fn empty_queue(&self) -> Self::Queue;
}
