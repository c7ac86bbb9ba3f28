//! Non-blocking queue descriptors: a locked `VecDeque` and the two
//! `crossbeam-queue` queues.

use std::collections::VecDeque;

use contract_tck::descriptor::Descriptor;
use contract_tck::{
    Capabilities, ContainerError, Element, Item, QueueImplementation, QueueUnderTest, SIZE,
    SharedItem,
};
use crossbeam_queue::{ArrayQueue, SegQueue};
use parking_lot::Mutex;

/// An unbounded deque behind a mutex.
#[derive(Debug)]
pub struct LockedDeque<E>(Mutex<VecDeque<E>>);

impl<E> Default for LockedDeque<E> {
    fn default() -> Self {
        Self(Mutex::default())
    }
}

impl<E: Element> QueueUnderTest<E> for LockedDeque<E> {
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.0.lock().push_back(element);
        Ok(true)
    }

    fn poll(&self) -> Option<E> {
        self.0.lock().pop_front()
    }

    fn peek(&self) -> Result<Option<E>, ContainerError> {
        Ok(self.0.lock().front().cloned())
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// `VecDeque<SharedItem>` behind a mutex.
#[derive(Debug, Clone, Copy, Default)]
pub struct VecDequeImpl;

impl Descriptor for VecDequeImpl {
    fn name(&self) -> &str {
        "vec-deque"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent().peek()
    }
}

impl QueueImplementation for VecDequeImpl {
    type Elem = SharedItem;
    type Queue = LockedDeque<SharedItem>;

    fn empty_queue(&self) -> Self::Queue {
        LockedDeque::default()
    }
}

/// Lock-free unbounded queue; offers no way to look at the head.
#[derive(Debug)]
pub struct Segmented<E>(SegQueue<E>);

impl<E: Element> QueueUnderTest<E> for Segmented<E> {
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.0.push(element);
        Ok(true)
    }

    fn poll(&self) -> Option<E> {
        self.0.pop()
    }

    fn peek(&self) -> Result<Option<E>, ContainerError> {
        Err(ContainerError::Unsupported)
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// `crossbeam_queue::SegQueue<SharedItem>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegQueueImpl;

impl Descriptor for SegQueueImpl {
    fn name(&self) -> &str {
        "seg-queue"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl QueueImplementation for SegQueueImpl {
    type Elem = SharedItem;
    type Queue = Segmented<SharedItem>;

    fn empty_queue(&self) -> Self::Queue {
        Segmented(SegQueue::new())
    }
}

/// Lock-free bounded queue.
#[derive(Debug)]
pub struct Bounded<E>(ArrayQueue<E>);

impl<E: Element> QueueUnderTest<E> for Bounded<E> {
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        Ok(self.0.push(element).is_ok())
    }

    fn poll(&self) -> Option<E> {
        self.0.pop()
    }

    fn peek(&self) -> Result<Option<E>, ContainerError> {
        Err(ContainerError::Unsupported)
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.0.capacity())
    }
}

/// `crossbeam_queue::ArrayQueue<Item>` holding `SIZE` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayQueueImpl;

impl Descriptor for ArrayQueueImpl {
    fn name(&self) -> &str {
        "array-queue"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl QueueImplementation for ArrayQueueImpl {
    type Elem = Item;
    type Queue = Bounded<Item>;

    fn empty_queue(&self) -> Self::Queue {
        Bounded(ArrayQueue::new(SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_queue_reports_full() {
        let queue = ArrayQueueImpl.empty_queue();
        for i in 0..SIZE as i32 {
            assert_eq!(queue.offer(Some(Item::new(i))), Ok(true));
        }
        assert_eq!(queue.offer(Some(Item::new(-1))), Ok(false));
        assert_eq!(queue.capacity(), Some(SIZE));
    }

    #[test]
    fn seg_queue_has_no_peek() {
        let queue = SegQueueImpl.empty_queue();
        assert_eq!(queue.peek(), Err(ContainerError::Unsupported));
        assert_eq!(queue.offer(None), Err(ContainerError::NullElement));
    }

    #[test]
    fn vec_deque_defaults_and_peeks() {
        let queue = LockedDeque::<Item>::default();
        assert_eq!(queue.peek(), Ok(None));
        assert_eq!(queue.offer(Some(Item::new(4))), Ok(true));
        assert_eq!(queue.peek(), Ok(Some(Item::new(4))));
        assert_eq!(VecDequeImpl.empty_queue().len(), 0);
    }
}
