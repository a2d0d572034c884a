//! Content-addressed on-disk cache for solid prep data.
//!
//! Prep data is expensive to derive but depends only on a solid's placement
//! and defining parameters. This crate names each prepared object by a hash
//! of those inputs, stores the serialized prep data as a compressed entry
//! under that name, and lets later runs (and concurrent processes) map the
//! entry back instead of recomputing it.
//!
//! The cache is strictly an optimization: every failure degrades to
//! recomputing, and [`ensure_prepared`] gives the same result with or without
//! a cache.

#![warn(missing_docs)]

pub mod cache;
pub mod codec;
mod commit;
pub mod compress;
pub mod config;
pub mod container;
pub mod error;
pub mod facade;
pub mod format;
pub mod hooks;
mod load;
pub mod name;
pub mod store;

pub use cache::CacheHandle;
pub use codec::{PrepCodec, PrepCompute, SerializedPrep};
pub use config::{load_config_from_str, parse_location, CacheConfig, CacheLocation, CACHE_ENV_VAR};
pub use error::{CacheError, FailureKind, MissReason};
pub use facade::{ensure_prepared, Solid};
pub use format::FORMAT_VERSION;
pub use hooks::{Hooks, LogSink};
pub use name::{ObjectName, RawObject};
pub use prep_common::Matrix4;
