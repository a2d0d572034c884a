//! Error types for cache operations.

use std::fmt;
use std::path::PathBuf;

/// The closed set of ways a cache operation can fail.
///
/// Every [`CacheError`] maps to exactly one kind, so callers can branch on the
/// category without matching individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The cache is disabled for this process.
    Unavailable,
    /// The entry is absent or unusable; indistinguishable from "not yet cached".
    Miss,
    /// A concurrent writer published a conflicting entry.
    WriteRace,
    /// A filesystem or encoding operation failed.
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Miss => "miss",
            FailureKind::WriteRace => "write race",
            FailureKind::Io => "I/O",
        };
        f.write_str(s)
    }
}

/// Why a lookup did not produce a usable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No file exists at the entry path.
    Absent,
    /// The file exists but is empty, possibly mid-write by another process.
    Empty,
    /// The file could not be memory-mapped.
    MapFailed,
    /// The container framing or envelope could not be parsed.
    BadEnvelope,
    /// The envelope names a different object.
    NameMismatch,
    /// The envelope mime type is not the prep cache mime type.
    MimeMismatch,
    /// The serializer version tag is missing or not accepted by the codec.
    VersionMismatch,
    /// The body checksum does not match the stored checksum.
    ChecksumMismatch,
    /// The body could not be decompressed.
    Decompress,
    /// The codec rejected the decompressed payload.
    Deserialize,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissReason::Absent => "no entry on disk",
            MissReason::Empty => "entry file is empty",
            MissReason::MapFailed => "entry could not be mapped",
            MissReason::BadEnvelope => "malformed envelope",
            MissReason::NameMismatch => "envelope names another object",
            MissReason::MimeMismatch => "unexpected mime type",
            MissReason::VersionMismatch => "unsupported serializer version",
            MissReason::ChecksumMismatch => "body checksum mismatch",
            MissReason::Decompress => "body failed to decompress",
            MissReason::Deserialize => "payload failed to deserialize",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during cache operations.
///
/// Cache operations are fail-safe: none of these errors is ever fatal to the
/// caller, and every one of them degrades to recomputing the prep data.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The cache cannot be used by this process.
    #[error("cache unavailable: {reason}")]
    Unavailable {
        /// Description of why the cache is disabled.
        reason: String,
    },

    /// The requested entry is not usable.
    #[error("cache miss for {name}: {reason}")]
    Miss {
        /// The object name that was looked up.
        name: String,
        /// Why the lookup missed.
        reason: MissReason,
    },

    /// Another writer published an entry whose size never matched ours.
    #[error("write race on {path}: expected {expected} bytes, found {found}")]
    WriteRace {
        /// The contested final entry path.
        path: PathBuf,
        /// Size of the container this writer produced.
        expected: u64,
        /// Size of the competing file after the last poll.
        found: u64,
    },

    /// The prep codec failed to serialize or produced no version tag.
    #[error("prep codec error: {reason}")]
    Codec {
        /// Description of the codec failure.
        reason: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid cache configuration: {reason}")]
    Config {
        /// Description of the configuration problem.
        reason: String,
    },
}

impl CacheError {
    /// Returns the failure category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            CacheError::Unavailable { .. } | CacheError::Config { .. } => FailureKind::Unavailable,
            CacheError::Miss { .. } => FailureKind::Miss,
            CacheError::WriteRace { .. } => FailureKind::WriteRace,
            CacheError::Io { .. } | CacheError::Codec { .. } => FailureKind::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn miss(name: impl fmt::Display, reason: MissReason) -> Self {
        CacheError::Miss {
            name: name.to_string(),
            reason,
        }
    }

    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        CacheError::Unavailable {
            reason: reason.into(),
        }
    }
}
