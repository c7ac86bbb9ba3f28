use super::Descriptor;
use crate::element::Element;
use crate::error::ContainerError;

/// A collection being validated.
pub trait CollectionUnderTest<E>: Send + Sync {
    /// Adds `element`; returns whether the collection changed.
    fn add(&self, element: Option<E>) -> Result<bool, ContainerError>;

    /// Whether an element equal to `element` is present.
    fn contains(&self, element: Option<&E>) -> bool;

    /// Removes one element equal to `element`; returns whether one was removed.
    fn remove(&self, element: Option<&E>) -> bool;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every element.
    fn clear(&self);

    /// Snapshot of the contents in iteration order.
    fn to_vec(&self) -> Vec<Option<E>>;

    /// Keeps only the elements for which `keep` returns true.
    fn retain(&self, keep: &mut dyn FnMut(Option<&E>) -> bool);

    /// Serializes and deserializes the collection into a new instance.
    fn serial_clone(&self) -> Result<Self, ContainerError>
    where
        Self: Sized,
    {
        Err(ContainerError::Unsupported)
    }
}

/// Descriptor for a collection implementation.
pub trait CollectionImplementation: Descriptor {
    /// Element type.
    type Elem: Element;
    /// Concrete container.
    type Collection: CollectionUnderTest<Self::Elem> + 'static;

    /// A new, empty collection. Distinct on every call.
    fn empty_collection(&self) -> Self::Collection;
}
