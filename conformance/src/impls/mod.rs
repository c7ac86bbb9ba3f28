//! Descriptors for the containers under test.
//!
//! Every container is wrapped so that it can be shared by reference across
//! auxiliary threads; whether the wrapper is declared `concurrent` is a
//! statement about the contract the implementation promises, not about the
//! lock that happens to make it `Sync`.

pub mod channels;
pub mod collections;
pub mod maps;
pub mod queues;
pub mod synchronizers;

use std::time::Duration;

use contract_tck::ContainerError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Longest uninterruptible wait inside a blocking operation.
pub(crate) const SLICE: Duration = Duration::from_millis(2);

/// Round-trips `value` through JSON.
pub(crate) fn json_round_trip<T>(value: &T) -> Result<T, ContainerError>
where
    T: Serialize + DeserializeOwned,
{
    let bytes = serde_json::to_vec(value).map_err(|err| {
        tracing::warn!(error = %err, "serialization failed");
        ContainerError::Serialization
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        tracing::warn!(error = %err, "deserialization failed");
        ContainerError::Serialization
    })
}
