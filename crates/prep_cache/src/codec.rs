//! Seams to the external prep collaborators.
//!
//! The cache never interprets prep data. A [`PrepCodec`] turns prep data into
//! versioned bytes and back, and a [`PrepCompute`] derives prep data from an
//! object when the cache has nothing usable.

use prep_common::Matrix4;

use crate::name::RawObject;

/// Prep data serialized by a [`PrepCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedPrep {
    /// The serialized prep data.
    pub payload: Vec<u8>,
    /// The serializer's version tag; must be non-empty to be cacheable.
    pub version: String,
}

/// Serializes and deserializes one kind of prep data.
pub trait PrepCodec {
    /// The in-memory prep data.
    type Prep;

    /// Serializes `prep`, tagging the bytes with the serializer version.
    fn serialize(&self, prep: &Self::Prep) -> Result<SerializedPrep, String>;

    /// Rebuilds prep data from bytes written under `version`.
    fn deserialize(&self, payload: &[u8], version: &str) -> Result<Self::Prep, String>;

    /// Whether payloads tagged `version` can be read by this codec.
    ///
    /// Entries with an unaccepted tag are treated as misses, which retires
    /// entries written by incompatible code without a format bump.
    fn accepts_version(&self, version: &str) -> bool;
}

/// Computes prep data without the cache.
pub trait PrepCompute: PrepCodec {
    /// Derives prep data for `raw` placed by `matrix`, or `None` on failure.
    fn compute(&self, matrix: Option<&Matrix4>, raw: &RawObject<'_>) -> Option<Self::Prep>;
}
