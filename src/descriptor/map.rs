use super::Descriptor;
use crate::element::Element;
use crate::error::ContainerError;

/// A map being validated. Keys and values share the element type `E`.
///
/// Lookups return `Option<Option<E>>`: the outer option is presence of the
/// key, the inner one a possibly-null value.
pub trait MapUnderTest<E>: Send + Sync {
    /// Maps `key` to `value`, returning the previous mapping.
    fn put(&self, key: Option<E>, value: Option<E>) -> Result<Option<Option<E>>, ContainerError>;

    /// Maps `key` to `value` only if unmapped; returns the existing mapping.
    fn put_if_absent(
        &self,
        key: Option<E>,
        value: Option<E>,
    ) -> Result<Option<Option<E>>, ContainerError>;

    /// The value mapped to `key`.
    fn get(&self, key: Option<&E>) -> Option<Option<E>>;

    /// Whether `key` is mapped.
    fn contains_key(&self, key: Option<&E>) -> bool;

    /// Whether some key maps to `value`.
    fn contains_value(&self, value: Option<&E>) -> bool;

    /// Removes the mapping for `key`, returning it.
    fn remove(&self, key: Option<&E>) -> Option<Option<E>>;

    /// Number of mappings.
    fn len(&self) -> usize;

    /// Whether the map is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every mapping.
    fn clear(&self);

    /// Snapshot of the entries in iteration order.
    fn entries(&self) -> Vec<(Option<E>, Option<E>)>;

    /// Rewrites every value in place while iterating the entries.
    fn update_values(
        &self,
        update: &mut dyn FnMut(Option<&E>, &mut Option<E>),
    ) -> Result<(), ContainerError>;

    /// Serializes and deserializes the map into a new instance.
    fn serial_clone(&self) -> Result<Self, ContainerError>
    where
        Self: Sized,
    {
        Err(ContainerError::Unsupported)
    }
}

/// Descriptor for a map implementation.
pub trait MapImplementation: Descriptor {
    /// Key and value type.
    type Elem: Element;
    /// Concrete container.
    type Map: MapUnderTest<Self::Elem> + 'static;

    /// A new, empty map. Distinct on every call.
    fn empty_map(&self) -> Self::Map;
}
