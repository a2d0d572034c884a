//! The cache handle.
//!
//! A [`CacheHandle`] ties together a validated root, the entry table, the
//! writer settings, and the log sinks. It is opened once per process (or per
//! prep phase) and passed explicitly to every cache call; there is no global
//! cache state.

use std::path::Path;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::format::{prepare_root, Access};
use crate::hooks::{Hooks, LogSink};
use crate::name::ObjectName;
use crate::store::CacheStore;

/// An open prep cache.
///
/// The handle is `Send + Sync`; share it by reference across the worker
/// threads of a prep phase. Every mapping it holds is released by
/// [`close`](Self::close) or when the handle is dropped.
#[derive(Debug)]
pub struct CacheHandle {
    /// Paths and the table of mapped entries.
    pub(crate) store: CacheStore,

    /// Whether this process may write entries.
    pub(crate) access: Access,

    /// Writer settings.
    pub(crate) config: CacheConfig,

    /// Log and debug sinks.
    pub(crate) hooks: Hooks,
}

impl CacheHandle {
    /// Opens the cache described by `config`.
    ///
    /// Returns [`CacheError::Unavailable`] when caching is disabled or the
    /// root is unusable; callers should then run uncached.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::open_with_hooks(config, Hooks::default())
    }

    /// Opens the cache selected by the `PREP_CACHE` environment variable.
    pub fn from_env() -> Result<Self, CacheError> {
        Self::open(&CacheConfig::from_env())
    }

    /// Opens the cache, routing messages emitted while opening to `hooks`.
    pub fn open_with_hooks(config: &CacheConfig, hooks: Hooks) -> Result<Self, CacheError> {
        let root = config.resolve_root().ok_or_else(|| {
            let reason = "caching is disabled or no cache directory is available";
            hooks.debug(format_args!("{reason}"));
            CacheError::unavailable(reason)
        })?;

        let access = match prepare_root(&root, config.read_only, &hooks) {
            Ok(access) => access,
            Err(e) => {
                hooks.warn(format_args!("prep cache disabled: {e}"));
                return Err(e);
            }
        };
        hooks.debug(format_args!(
            "opened prep cache at {} ({access:?})",
            root.display()
        ));

        Ok(Self {
            store: CacheStore::new(&root),
            access,
            config: config.clone(),
            hooks,
        })
    }

    /// Installs a sink receiving warnings.
    pub fn with_log_hook(mut self, sink: LogSink) -> Self {
        self.hooks.set_log(sink);
        self
    }

    /// Installs a sink receiving diagnostic messages.
    pub fn with_debug_hook(mut self, sink: LogSink) -> Self {
        self.hooks.set_debug(sink);
        self
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Returns `true` if this handle never writes.
    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    /// Path layout of this cache.
    pub fn paths(&self) -> &CacheStore {
        &self.store
    }

    /// Number of entries mapped by this handle.
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if `name` is mapped by this handle.
    pub fn contains(&self, name: &ObjectName) -> bool {
        self.store.contains(name)
    }

    /// Releases every mapping and closes the handle.
    ///
    /// Returns the number of entries that were mapped.
    pub fn close(self) -> usize {
        let released = self.store.release_all();
        self.hooks.debug(format_args!(
            "closed prep cache at {} ({released} entries released)",
            self.store.root().display()
        ));
        released
    }
}
