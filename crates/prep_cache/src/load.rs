//! Read path: table lookup, mapping, validation, and decoding.

use std::sync::Arc;

use crate::cache::CacheHandle;
use crate::codec::PrepCodec;
use crate::compress::decompress_block;
use crate::container::Container;
use crate::error::{CacheError, MissReason};
use crate::name::ObjectName;
use crate::store::CacheEntry;

impl CacheHandle {
    /// Loads the prep data cached under `name`.
    ///
    /// Returns `None` on any kind of miss; a miss is never an error and the
    /// caller simply recomputes.
    pub fn load<C: PrepCodec>(&self, name: &ObjectName, codec: &C) -> Option<C::Prep> {
        match self.try_load(name, codec) {
            Ok(prep) => {
                self.hooks.debug(format_args!("prep cache hit for {name}"));
                Some(prep)
            }
            Err(e) => {
                self.hooks.debug(format_args!("{e}"));
                None
            }
        }
    }

    /// Like [`load`](Self::load), but reports why a lookup missed.
    pub fn try_load<C: PrepCodec>(
        &self,
        name: &ObjectName,
        codec: &C,
    ) -> Result<C::Prep, CacheError> {
        let entry = self.open_entry(name)?;
        decode(&entry, name, codec).map_err(|reason| {
            self.store.evict(name, &entry);
            CacheError::miss(name, reason)
        })
    }

    /// Maps and validates the entry for `name` without decoding its body.
    ///
    /// Used right after a commit so the writing process gets a warm entry.
    pub(crate) fn warm(&self, name: &ObjectName) -> Result<(), CacheError> {
        let entry = self.open_entry(name)?;
        Container::parse(entry.bytes())
            .and_then(|c| c.check(name).map(drop))
            .map_err(|reason| {
                self.store.evict(name, &entry);
                CacheError::miss(name, reason)
            })
    }

    /// Returns the mapped entry for `name`, mapping it on first use.
    ///
    /// Nothing is recorded for a name that has no usable file, since another
    /// writer may still be about to publish it.
    fn open_entry(&self, name: &ObjectName) -> Result<Arc<CacheEntry>, CacheError> {
        if let Some(entry) = self.store.cached(name) {
            return Ok(entry);
        }
        let path = self.store.object_file(name);
        let entry = CacheEntry::open(&path).map_err(|reason| CacheError::miss(name, reason))?;
        Ok(self.store.insert(name, entry))
    }
}

fn decode<C: PrepCodec>(
    entry: &CacheEntry,
    name: &ObjectName,
    codec: &C,
) -> Result<C::Prep, MissReason> {
    let container = Container::parse(entry.bytes())?;
    let version = container.check(name)?;
    if !codec.accepts_version(version) {
        return Err(MissReason::VersionMismatch);
    }
    let payload = decompress_block(container.body).ok_or(MissReason::Decompress)?;
    codec
        .deserialize(&payload, version)
        .map_err(|_| MissReason::Deserialize)
}
