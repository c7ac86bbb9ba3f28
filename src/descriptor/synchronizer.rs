use std::time::Duration;

use super::Descriptor;
use crate::element::Element;
use crate::error::ContainerError;
use crate::sync::Interrupt;

/// A count-down latch being validated.
///
/// Waits follow the blocking queue rules: a pending interrupt is reported as
/// [`ContainerError::Interrupted`] on entry or during the wait, and consumed.
pub trait LatchUnderTest: Send + Sync {
    /// Decrements the count; has no effect once it is zero.
    fn count_down(&self);

    /// Current count.
    fn count(&self) -> usize;

    /// Waits up to `timeout` for the count to reach zero; `Ok(false)` on timeout.
    fn wait_timeout(&self, timeout: Duration, interrupt: &Interrupt)
    -> Result<bool, ContainerError>;

    /// Waits as long as necessary for the count to reach zero.
    fn wait(&self, interrupt: &Interrupt) -> Result<(), ContainerError>;
}

/// Descriptor for a latch implementation.
pub trait LatchImplementation: Descriptor {
    /// Concrete latch.
    type Latch: LatchUnderTest + 'static;

    /// A new latch that opens after `count` count-downs.
    fn latch(&self, count: usize) -> Self::Latch;
}

/// A two-party exchanger being validated.
///
/// Two threads meeting at the exchanger swap their values. A party that gives
/// up (timeout or interrupt) withdraws its value: no later partner receives it.
pub trait ExchangerUnderTest<E>: Send + Sync {
    /// Swaps `value` with a partner, waiting up to `timeout`; `Ok(None)` on timeout.
    fn exchange_timeout(
        &self,
        value: E,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Option<E>, ContainerError>;

    /// Swaps `value` with a partner, waiting as long as necessary.
    fn exchange(&self, value: E, interrupt: &Interrupt) -> Result<E, ContainerError>;
}

/// Descriptor for an exchanger implementation.
pub trait ExchangerImplementation: Descriptor {
    /// Type of the exchanged values.
    type Elem: Element;
    /// Concrete exchanger.
    type Exchanger: ExchangerUnderTest<Self::Elem> + 'static;

    /// A new exchanger with no party waiting.
    fn exchanger(&self) -> Self::Exchanger;
}
