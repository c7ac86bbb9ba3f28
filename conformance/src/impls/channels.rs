//! Blocking queue descriptors.
//!
//! [`ChannelQueue`] adapts the `std::sync::mpsc` channels: bounded
//! (`sync_channel(n)`), rendezvous (`sync_channel(0)`) and unbounded
//! (`channel()`). [`CondvarQueue`] is a bounded buffer built from a
//! `parking_lot` mutex and two condition variables.
//!
//! Neither primitive can be woken by an [`Interrupt`], so every wait is cut
//! into short slices with an interrupt checkpoint between them. Every
//! waiting operation also checkpoints on entry: a pending interrupt is
//! reported even when the operation could complete at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::mpsc::{
    self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError,
};
use std::time::{Duration, Instant};

use contract_tck::descriptor::Descriptor;
use contract_tck::{
    BlockingQueueImplementation, BlockingQueueUnderTest, Capabilities, ContainerError, Element,
    Interrupt, Item, SIZE, SharedItem,
};
use parking_lot::{Condvar, Mutex};

use super::SLICE;

/// Pause between attempts to insert into a full channel.
const BACKOFF: Duration = Duration::from_micros(200);

enum Tx<E> {
    Bounded(SyncSender<E>),
    Unbounded(Sender<E>),
}

/// A channel owning both of its ends.
pub struct ChannelQueue<E> {
    tx: Tx<E>,
    rx: Mutex<Receiver<E>>,
    // sent minus received; briefly negative when a rendezvous receiver
    // wins the race against the sender's increment
    in_flight: AtomicIsize,
    capacity: Option<usize>,
}

impl<E: Element> ChannelQueue<E> {
    /// A queue over `sync_channel(capacity)`, or `channel()` for `None`.
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let (tx, rx) = match capacity {
            Some(bound) => {
                let (tx, rx) = mpsc::sync_channel(bound);
                (Tx::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (Tx::Unbounded(tx), rx)
            }
        };
        Self {
            tx,
            rx: Mutex::new(rx),
            in_flight: AtomicIsize::new(0),
            capacity,
        }
    }

    /// Sends without waiting; hands the element back if there is no room.
    fn try_send(&self, element: E) -> Result<Option<E>, ContainerError> {
        let rejected = match &self.tx {
            Tx::Bounded(tx) => match tx.try_send(element) {
                Ok(()) => None,
                Err(TrySendError::Full(element)) => Some(element),
                Err(TrySendError::Disconnected(_)) => return Err(ContainerError::Disconnected),
            },
            Tx::Unbounded(tx) => {
                tx.send(element).map_err(|_| ContainerError::Disconnected)?;
                None
            }
        };
        if rejected.is_none() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        Ok(rejected)
    }

    fn received(&self, element: E) -> E {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        element
    }

    /// Waits up to `slice` for an element.
    fn recv_slice(&self, slice: Duration) -> Result<Option<E>, ContainerError> {
        match self.rx.lock().recv_timeout(slice) {
            Ok(element) => Ok(Some(self.received(element))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ContainerError::Disconnected),
        }
    }

    /// Sends, retrying until `deadline` (forever when `None`).
    fn send_until(
        &self,
        element: E,
        deadline: Option<Instant>,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        interrupt.checkpoint()?;
        let mut pending = element;
        loop {
            match self.try_send(pending)? {
                None => return Ok(true),
                Some(rejected) => pending = rejected,
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    BACKOFF.min(deadline - now)
                }
                None => BACKOFF,
            };
            interrupt.park_timeout(pause)?;
        }
    }
}

impl<E: Element> BlockingQueueUnderTest<E> for ChannelQueue<E> {
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        Ok(self.try_send(element)?.is_none())
    }

    fn offer_timeout(
        &self,
        element: Option<E>,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.send_until(element, Some(Instant::now() + timeout), interrupt)
    }

    fn put(&self, element: Option<E>, interrupt: &Interrupt) -> Result<(), ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.send_until(element, None, interrupt).map(|_| ())
    }

    fn poll(&self) -> Option<E> {
        let element = self.rx.lock().try_recv().ok()?;
        Some(self.received(element))
    }

    fn poll_timeout(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError> {
        interrupt.checkpoint()?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(element) = self.recv_slice(remaining.min(SLICE))? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            interrupt.checkpoint()?;
        }
    }

    fn take(&self, interrupt: &Interrupt) -> Result<E, ContainerError> {
        loop {
            interrupt.checkpoint()?;
            if let Some(element) = self.recv_slice(SLICE)? {
                return Ok(element);
            }
        }
    }

    fn len(&self) -> usize {
        let settled = usize::try_from(self.in_flight.load(Ordering::SeqCst)).unwrap_or(0);
        self.capacity.map_or(settled, |capacity| settled.min(capacity))
    }

    fn remaining_capacity(&self) -> Option<usize> {
        self.capacity.map(|capacity| capacity - self.len())
    }

    fn drain_to(&self, sink: &mut Vec<E>, max: usize) -> usize {
        let rx = self.rx.lock();
        let mut moved = 0;
        while moved < max {
            match rx.try_recv() {
                Ok(element) => {
                    sink.push(self.received(element));
                    moved += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        moved
    }
}

/// `std::sync::mpsc` channel of `SharedItem`s with a fixed capacity.
#[derive(Debug, Clone, Copy)]
pub struct ChannelQueueImpl {
    name: &'static str,
    capacity: Option<usize>,
}

impl ChannelQueueImpl {
    /// `sync_channel(SIZE)`.
    pub const SYNC: Self = Self {
        name: "sync-channel",
        capacity: Some(SIZE),
    };

    /// `sync_channel(1)`.
    pub const SYNC_ONE: Self = Self {
        name: "sync-channel-1",
        capacity: Some(1),
    };

    /// `sync_channel(0)`: every insertion is a hand-off to a waiting receiver.
    pub const RENDEZVOUS: Self = Self {
        name: "rendezvous",
        capacity: Some(0),
    };

    /// `channel()`.
    pub const UNBOUNDED: Self = Self {
        name: "channel",
        capacity: None,
    };

    /// Every channel flavor.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::SYNC, Self::SYNC_ONE, Self::RENDEZVOUS, Self::UNBOUNDED]
    }
}

impl Descriptor for ChannelQueueImpl {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl BlockingQueueImplementation for ChannelQueueImpl {
    type Elem = SharedItem;
    type Queue = ChannelQueue<SharedItem>;

    fn empty_queue(&self) -> Self::Queue {
        ChannelQueue::new(self.capacity)
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// Capacity of the queues handed out by [`CondvarQueueImpl`].
pub const CONDVAR_CAPACITY: usize = 8;

/// A bounded buffer guarded by a mutex, with one condition variable per
/// direction.
#[derive(Debug)]
pub struct CondvarQueue<E> {
    items: Mutex<VecDeque<E>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<E: Element> CondvarQueue<E> {
    /// An empty queue holding at most `capacity` elements.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    fn insert_until(
        &self,
        element: E,
        deadline: Option<Instant>,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        interrupt.checkpoint()?;
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    SLICE.min(deadline - now)
                }
                None => SLICE,
            };
            let _ = self.not_full.wait_for(&mut items, slice);
            interrupt.checkpoint()?;
        }
        items.push_back(element);
        self.not_empty.notify_one();
        Ok(true)
    }

    fn remove_until(
        &self,
        deadline: Option<Instant>,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError> {
        interrupt.checkpoint()?;
        let mut items = self.items.lock();
        loop {
            if let Some(element) = items.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(element));
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    SLICE.min(deadline - now)
                }
                None => SLICE,
            };
            let _ = self.not_empty.wait_for(&mut items, slice);
            interrupt.checkpoint()?;
        }
    }
}

impl<E: Element> BlockingQueueUnderTest<E> for CondvarQueue<E> {
    fn offer(&self, element: Option<E>) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Ok(false);
        }
        items.push_back(element);
        self.not_empty.notify_one();
        Ok(true)
    }

    fn offer_timeout(
        &self,
        element: Option<E>,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.insert_until(element, Some(Instant::now() + timeout), interrupt)
    }

    fn put(&self, element: Option<E>, interrupt: &Interrupt) -> Result<(), ContainerError> {
        let element = element.ok_or(ContainerError::NullElement)?;
        self.insert_until(element, None, interrupt).map(|_| ())
    }

    fn poll(&self) -> Option<E> {
        let element = self.items.lock().pop_front()?;
        self.not_full.notify_one();
        Some(element)
    }

    fn poll_timeout(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError> {
        self.remove_until(Some(Instant::now() + timeout), interrupt)
    }

    fn take(&self, interrupt: &Interrupt) -> Result<E, ContainerError> {
        loop {
            if let Some(element) = self.remove_until(None, interrupt)? {
                return Ok(element);
            }
        }
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn remaining_capacity(&self) -> Option<usize> {
        Some(self.capacity - self.len())
    }

    fn drain_to(&self, sink: &mut Vec<E>, max: usize) -> usize {
        let mut items = self.items.lock();
        let moved = max.min(items.len());
        sink.extend(items.drain(..moved));
        if moved > 0 {
            self.not_full.notify_all();
        }
        moved
    }
}

/// [`CondvarQueue`] of `Item`s holding [`CONDVAR_CAPACITY`] elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct CondvarQueueImpl;

impl Descriptor for CondvarQueueImpl {
    fn name(&self) -> &str {
        "condvar-queue"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl BlockingQueueImplementation for CondvarQueueImpl {
    type Elem = Item;
    type Queue = CondvarQueue<Item>;

    fn empty_queue(&self) -> Self::Queue {
        CondvarQueue::new(CONDVAR_CAPACITY)
    }

    fn capacity(&self) -> Option<usize> {
        Some(CONDVAR_CAPACITY)
    }
}
