//! Deterministic object naming.
//!
//! An entry's name is derived in two stages: the transform matrix seeds a
//! namespace, and the object's raw serialized bytes are hashed inside that
//! namespace. Identical geometry placed by two different matrices therefore
//! caches under two different names.

use std::fmt;
use std::path::Path;

use prep_common::Matrix4;
use uuid::Uuid;

/// Length of a canonical object name.
pub const NAME_LEN: usize = 36;

/// Fixed base namespace for the first hashing stage.
const BASE_NAMESPACE: Uuid = uuid::uuid!("6b1f3e2a-9c4d-5e8f-a017-2c3b4d5e6f70");

/// The raw form of an object as held by its owning database.
///
/// `bytes` is the only input to naming; `name` and `source_path` are recorded
/// as provenance in the cached envelope.
#[derive(Debug, Clone, Copy)]
pub struct RawObject<'a> {
    /// Name of the object in its owning database.
    pub name: &'a str,
    /// Path of the owning database, if it lives in a file.
    pub source_path: Option<&'a Path>,
    /// The object's serialized bytes.
    pub bytes: &'a [u8],
}

impl<'a> RawObject<'a> {
    /// Creates a raw object with no provenance path.
    pub fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            name,
            source_path: None,
            bytes,
        }
    }

    /// Records the path of the owning database.
    pub fn with_source_path(mut self, path: &'a Path) -> Self {
        self.source_path = Some(path);
        self
    }
}

/// A 36-character cache entry name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName(String);

impl ObjectName {
    /// Derives the name of `raw` placed by `matrix` (identity if absent).
    ///
    /// Returns `None` when no identity can be derived: a matrix containing
    /// non-finite values or an object with no content. Callers treat that as
    /// "do not cache".
    pub fn generate(matrix: Option<&Matrix4>, raw: &RawObject<'_>) -> Option<Self> {
        let matrix = matrix.copied().unwrap_or(Matrix4::IDENTITY);
        if !matrix.is_finite() || raw.bytes.is_empty() {
            return None;
        }
        let placed = Uuid::new_v5(&BASE_NAMESPACE, &matrix.to_be_bytes());
        let id = Uuid::new_v5(&placed, raw.bytes);
        Some(Self(id.hyphenated().to_string()))
    }

    /// Accepts an existing name.
    ///
    /// A valid name is exactly [`NAME_LEN`] ASCII alphanumerics or hyphens, so
    /// it can never escape its shard directory.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == NAME_LEN
            && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        valid.then(|| Self(s.to_string()))
    }

    /// The two-character shard prefix.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectName({})", self.0)
    }
}
