//! Implementation descriptors.
//!
//! A descriptor binds a contract to one concrete implementation: it names the
//! implementation, declares its [`Capabilities`], and hands out fresh, empty
//! containers. Contracts branch only on declared capabilities, never on the
//! concrete container type.
//!
//! Container-under-test traits take `&self` and are `Send + Sync`, so a
//! container can be shared with auxiliary threads for the duration of one
//! test. "Null" is `None`: every insertion takes an `Option`.

mod blocking;
mod collection;
mod map;
mod queue;
mod synchronizer;

pub use blocking::{BlockingQueueImplementation, BlockingQueueUnderTest};
pub use collection::{CollectionImplementation, CollectionUnderTest};
pub use map::{MapImplementation, MapUnderTest};
pub use queue::{QueueImplementation, QueueUnderTest};
pub use synchronizer::{
    ExchangerImplementation, ExchangerUnderTest, LatchImplementation, LatchUnderTest,
};

use serde::{Deserialize, Serialize};

/// Order in which an implementation iterates its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationOrder {
    /// Order of first insertion.
    Insertion,
    /// Natural order of the elements (keys, for maps).
    Sorted,
    /// No promise.
    #[default]
    Unspecified,
}

/// Static facts about an implementation, consulted by contracts.
///
/// For collections and queues, `permits_null_keys` governs null elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Null keys (or elements) are accepted.
    pub permits_null_keys: bool,
    /// Null values are accepted.
    pub permits_null_values: bool,
    /// Safe to use from several threads at once.
    pub concurrent: bool,
    /// Entries can be updated in place while iterating.
    pub mutable_entries: bool,
    /// Iteration order.
    pub order: IterationOrder,
    /// Equal elements may be held more than once.
    pub duplicates: bool,
    /// `serial_clone` is supported.
    pub serializable: bool,
    /// `peek` is supported.
    pub peek: bool,
}

impl Capabilities {
    /// No capabilities; unspecified order.
    pub const NONE: Self = Self {
        permits_null_keys: false,
        permits_null_values: false,
        concurrent: false,
        mutable_entries: false,
        order: IterationOrder::Unspecified,
        duplicates: false,
        serializable: false,
        peek: false,
    };

    /// Accept null keys (or elements).
    #[must_use]
    pub const fn null_keys(mut self) -> Self {
        self.permits_null_keys = true;
        self
    }

    /// Accept null values.
    #[must_use]
    pub const fn null_values(mut self) -> Self {
        self.permits_null_values = true;
        self
    }

    /// Declare thread safety.
    #[must_use]
    pub const fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }

    /// Declare in-place entry mutation.
    #[must_use]
    pub const fn mutable_entries(mut self) -> Self {
        self.mutable_entries = true;
        self
    }

    /// Declare the iteration order.
    #[must_use]
    pub const fn order(mut self, order: IterationOrder) -> Self {
        self.order = order;
        self
    }

    /// Allow duplicate elements.
    #[must_use]
    pub const fn duplicates(mut self) -> Self {
        self.duplicates = true;
        self
    }

    /// Declare serialization support.
    #[must_use]
    pub const fn serializable(mut self) -> Self {
        self.serializable = true;
        self
    }

    /// Declare `peek` support.
    #[must_use]
    pub const fn peek(mut self) -> Self {
        self.peek = true;
        self
    }
}

/// Common surface of every descriptor.
pub trait Descriptor: Send + Sync + 'static {
    /// Name of the concrete implementation, used in reports.
    fn name(&self) -> &str;

    /// Declared capabilities.
    fn capabilities(&self) -> Capabilities;
}

/// Descriptor for contracts that exercise the platform directly and need no
/// container (atomics, park/unpark, thread-locals, barriers, tasks).
#[derive(Debug, Clone, Copy, Default)]
pub struct Platform;

impl Descriptor for Platform {
    fn name(&self) -> &str {
        "std"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.concurrent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        const CAPS: Capabilities = Capabilities::NONE
            .null_keys()
            .order(IterationOrder::Insertion)
            .serializable();
        assert!(CAPS.permits_null_keys);
        assert!(!CAPS.permits_null_values);
        assert_eq!(CAPS.order, IterationOrder::Insertion);
        assert!(CAPS.serializable);
        assert!(!CAPS.concurrent);
        assert_eq!(Capabilities::default(), Capabilities::NONE);
    }

    #[test]
    fn capabilities_serialize() {
        let json = serde_json::to_value(Capabilities::NONE.concurrent()).unwrap();
        assert_eq!(json["concurrent"], serde_json::json!(true));
        assert_eq!(json["order"], serde_json::json!("unspecified"));
    }
}
