//! Latch and exchanger descriptors.
//!
//! `std` ships neither primitive, so these are the two shapes such code is
//! usually written in: a lock with a condition variable, and an atomic count
//! whose waiters park.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use contract_tck::descriptor::Descriptor;
use contract_tck::{
    Capabilities, ContainerError, CountDownLatch, Element, ExchangerImplementation,
    ExchangerUnderTest, Interrupt, LatchImplementation, LatchUnderTest, SharedItem,
};
use parking_lot::{Condvar, Mutex};

use super::SLICE;

/// Length of the next wait slice, or `None` once `deadline` has passed.
fn next_slice(deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        Some(deadline) => {
            let now = Instant::now();
            (now < deadline).then(|| SLICE.min(deadline - now))
        }
        None => Some(SLICE),
    }
}

/// The kit's own [`CountDownLatch`], waited on in interruptible slices.
#[derive(Debug)]
pub struct SlicedLatch(CountDownLatch);

impl SlicedLatch {
    fn wait_until(
        &self,
        deadline: Option<Instant>,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        interrupt.checkpoint()?;
        loop {
            let Some(slice) = next_slice(deadline) else {
                return Ok(self.0.count() == 0);
            };
            if self.0.wait_timeout(slice) {
                return Ok(true);
            }
            interrupt.checkpoint()?;
        }
    }
}

impl LatchUnderTest for SlicedLatch {
    fn count_down(&self) {
        self.0.count_down();
    }

    fn count(&self) -> usize {
        self.0.count()
    }

    fn wait_timeout(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        self.wait_until(Some(Instant::now() + timeout), interrupt)
    }

    fn wait(&self, interrupt: &Interrupt) -> Result<(), ContainerError> {
        self.wait_until(None, interrupt).map(|_| ())
    }
}

/// [`CountDownLatch`] from `contract-tck`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountDownLatchImpl;

impl Descriptor for CountDownLatchImpl {
    fn name(&self) -> &str {
        "count-down-latch"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl LatchImplementation for CountDownLatchImpl {
    type Latch = SlicedLatch;

    fn latch(&self, count: usize) -> Self::Latch {
        SlicedLatch(CountDownLatch::new(count))
    }
}

/// An atomic count whose waiters park until the count reaches zero.
#[derive(Debug)]
pub struct ParkingLatch {
    count: AtomicUsize,
    waiters: Mutex<Vec<Thread>>,
}

impl ParkingLatch {
    /// A latch that opens after `count` count-downs.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
            waiters: Mutex::new(Vec::new()),
        }
    }

    fn is_open(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }

    fn wait_until(
        &self,
        deadline: Option<Instant>,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        interrupt.checkpoint()?;
        if self.is_open() {
            return Ok(true);
        }
        let me = thread::current();
        self.waiters.lock().push(me.clone());
        let outcome = loop {
            if self.is_open() {
                break Ok(true);
            }
            let Some(slice) = next_slice(deadline) else {
                break Ok(false);
            };
            if let Err(err) = interrupt.park_timeout(slice) {
                break Err(err);
            }
        };
        self.waiters.lock().retain(|waiter| waiter.id() != me.id());
        outcome
    }
}

impl LatchUnderTest for ParkingLatch {
    fn count_down(&self) {
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1));
        if previous == Ok(1) {
            for waiter in self.waiters.lock().drain(..) {
                waiter.unpark();
            }
        }
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn wait_timeout(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, ContainerError> {
        self.wait_until(Some(Instant::now() + timeout), interrupt)
    }

    fn wait(&self, interrupt: &Interrupt) -> Result<(), ContainerError> {
        self.wait_until(None, interrupt).map(|_| ())
    }
}

/// [`ParkingLatch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParkingLatchImpl;

impl Descriptor for ParkingLatchImpl {
    fn name(&self) -> &str {
        "parking-latch"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl LatchImplementation for ParkingLatchImpl {
    type Latch = ParkingLatch;

    fn latch(&self, count: usize) -> Self::Latch {
        ParkingLatch::new(count)
    }
}

#[derive(Debug)]
struct Slot<E> {
    /// Value of the party waiting for a partner.
    offered: Option<E>,
    /// Partner's value, waiting to be collected by the offering party.
    answer: Option<E>,
    /// Bumped each time a waiting party is matched.
    matches: u64,
}

/// A single-slot exchanger: the first party parks its value in the slot, the
/// second swaps it for its own.
#[derive(Debug)]
pub struct SlotExchanger<E> {
    slot: Mutex<Slot<E>>,
    changed: Condvar,
}

impl<E> Default for SlotExchanger<E> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot {
                offered: None,
                answer: None,
                matches: 0,
            }),
            changed: Condvar::new(),
        }
    }
}

impl<E: Element> SlotExchanger<E> {
    fn exchange_until(
        &self,
        value: E,
        deadline: Option<Instant>,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError> {
        interrupt.checkpoint()?;
        let mut slot = self.slot.lock();

        // wait for the slot to be free, or for a waiting partner
        loop {
            if slot.answer.is_none() {
                if let Some(theirs) = slot.offered.take() {
                    slot.answer = Some(value);
                    slot.matches += 1;
                    self.changed.notify_all();
                    return Ok(Some(theirs));
                }
                break;
            }
            let Some(wait) = next_slice(deadline) else {
                return Ok(None);
            };
            let _ = self.changed.wait_for(&mut slot, wait);
            interrupt.checkpoint()?;
        }

        slot.offered = Some(value);
        let ticket = slot.matches;
        loop {
            if slot.matches != ticket {
                let answer = slot.answer.take();
                self.changed.notify_all();
                return Ok(answer);
            }
            let outcome = match next_slice(deadline) {
                None => Ok(None),
                Some(wait) => {
                    let _ = self.changed.wait_for(&mut slot, wait);
                    if slot.matches != ticket {
                        continue;
                    }
                    match interrupt.checkpoint() {
                        Ok(()) => continue,
                        Err(err) => Err(err),
                    }
                }
            };
            // unmatched: withdraw the offer
            slot.offered = None;
            self.changed.notify_all();
            return outcome;
        }
    }
}

impl<E: Element> ExchangerUnderTest<E> for SlotExchanger<E> {
    fn exchange_timeout(
        &self,
        value: E,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError> {
        self.exchange_until(value, Some(Instant::now() + timeout), interrupt)
    }

    fn exchange(&self, value: E, interrupt: &Interrupt) -> Result<E, ContainerError> {
        loop {
            if let Some(theirs) = self.exchange_until(value.clone(), None, interrupt)? {
                return Ok(theirs);
            }
        }
    }
}

/// [`SlotExchanger`] of `SharedItem`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotExchangerImpl;

impl Descriptor for SlotExchangerImpl {
    fn name(&self) -> &str {
        "slot-exchanger"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

impl ExchangerImplementation for SlotExchangerImpl {
    type Elem = SharedItem;
    type Exchanger = SlotExchanger<SharedItem>;

    fn exchanger(&self) -> Self::Exchanger {
        SlotExchanger::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn parking_latch_stops_at_zero() {
        let latch = ParkingLatchImpl.latch(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 0);
        assert_eq!(latch.wait_timeout(Duration::ZERO, &Interrupt::current()), Ok(true));
    }

    #[test]
    fn parking_latch_releases_parked_waiter() {
        let latch = Arc::new(ParkingLatchImpl.latch(1));
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait_timeout(Duration::from_secs(10), &Interrupt::current()))
        };
        thread::sleep(Duration::from_millis(10));
        latch.count_down();
        assert_eq!(waiter.join().unwrap(), Ok(true));
    }

    #[test]
    fn sliced_latch_observes_pending_interrupt() {
        let latch = CountDownLatchImpl.latch(0);
        let interrupt = Interrupt::current();
        interrupt.interrupt();
        assert_eq!(latch.wait(&interrupt), Err(ContainerError::Interrupted));
        assert_eq!(latch.wait(&interrupt), Ok(()));
    }

    #[test]
    fn lone_exchange_withdraws_its_offer() {
        let exchanger = SlotExchangerImpl.exchanger();
        let interrupt = Interrupt::current();
        let offered = SharedItem::from_index(1);
        assert_eq!(
            exchanger.exchange_timeout(offered, Duration::from_millis(5), &interrupt),
            Ok(None)
        );
        let slot = exchanger.slot.lock();
        assert!(slot.offered.is_none());
        assert!(slot.answer.is_none());
    }

    #[test]
    fn pair_swaps_values() {
        let exchanger = Arc::new(SlotExchangerImpl.exchanger());
        let partner = {
            let exchanger = Arc::clone(&exchanger);
            thread::spawn(move || exchanger.exchange(SharedItem::from_index(2), &Interrupt::current()))
        };
        let got = exchanger.exchange(SharedItem::from_index(1), &Interrupt::current());
        assert_eq!(got, Ok(SharedItem::from_index(2)));
        assert_eq!(partner.join().unwrap(), Ok(SharedItem::from_index(1)));
    }
}
