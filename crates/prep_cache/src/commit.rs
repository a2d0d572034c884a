//! Write path: encode, write to a temp file, publish atomically, and
//! reconcile with concurrent writers.
//!
//! Processes sharing a cache directory coordinate only through the
//! filesystem. An entry becomes visible in a single no-clobber link (or
//! rename) of a fully written temp file, so readers never see a partial
//! entry and at most one file ever exists at a final path. When two writers
//! race on one name, the loser compares sizes with the winner: entry names are
//! derived from content, so an equal size is taken as equal content.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::thread;

use crate::cache::CacheHandle;
use crate::codec::PrepCodec;
use crate::compress::compress_block;
use crate::container::{self, Envelope};
use crate::error::CacheError;
use crate::format::Access;
use crate::name::{ObjectName, RawObject};
use crate::store::{ensure_path, is_writable, unique_suffix};

impl CacheHandle {
    /// Caches `prep` under `name`.
    ///
    /// On `Ok`, a later load of `name` sees an entry with byte-identical
    /// content, written either by this call or by a concurrent writer that
    /// got there first. Errors only mean "not cached this time".
    pub fn store<C: PrepCodec>(
        &self,
        name: &ObjectName,
        raw: &RawObject<'_>,
        prep: &C::Prep,
        codec: &C,
    ) -> Result<(), CacheError> {
        if self.access == Access::ReadOnly {
            return Err(CacheError::unavailable("cache is read-only"));
        }

        let serialized = codec
            .serialize(prep)
            .map_err(|reason| CacheError::Codec { reason })?;
        if serialized.version.is_empty() {
            return Err(CacheError::Codec {
                reason: "serializer produced no version tag".to_string(),
            });
        }

        let body = match compress_block(&serialized.payload) {
            Cow::Owned(block) => block,
            Cow::Borrowed(_) => {
                return Err(CacheError::Codec {
                    reason: "payload could not be compressed".to_string(),
                });
            }
        };
        let envelope = Envelope::for_body(name, raw, &serialized.version, &body);
        let bytes = container::encode(&envelope, &body)?;

        self.commit(name, &bytes)?;

        if let Err(e) = self.warm(name) {
            self.hooks
                .warn(format_args!("committed entry {name} did not validate: {e}"));
        }
        Ok(())
    }

    /// Publishes `bytes` as the entry for `name`.
    fn commit(&self, name: &ObjectName, bytes: &[u8]) -> Result<(), CacheError> {
        let dir = self.store.object_dir(name);
        let final_path = self.store.object_file(name);

        let probe_dir = if dir.is_dir() {
            dir.clone()
        } else {
            self.store.objects_dir()
        };
        if !is_writable(&probe_dir) {
            return Err(CacheError::unavailable(format!(
                "{} is not writable",
                probe_dir.display()
            )));
        }

        let tmp = dir.join(format!("{name}.{}.tmp", unique_suffix()));
        let _ = fs::remove_file(&tmp);

        ensure_path(&dir, false).map_err(|e| CacheError::io(&dir, e))?;
        if let Err(e) = write_whole(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::io(&tmp, e));
        }

        let expected = bytes.len() as u64;
        if final_path.exists() {
            let outcome = self.reconcile(&final_path, expected);
            if outcome.is_err() && self.config.keep_failed_temps {
                self.hooks
                    .warn(format_args!("kept losing write at {}", tmp.display()));
            } else {
                let _ = fs::remove_file(&tmp);
            }
            return outcome;
        }

        self.publish_or_reconcile(&tmp, &final_path, expected)
    }

    /// Publishes `tmp` at `final_path`, falling back to size reconciliation
    /// when another writer published first.
    fn publish_or_reconcile(
        &self,
        tmp: &Path,
        final_path: &Path,
        expected: u64,
    ) -> Result<(), CacheError> {
        match publish(tmp, final_path) {
            Ok(()) => {
                self.hooks.debug(format_args!(
                    "committed {} ({expected} bytes)",
                    final_path.display()
                ));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(tmp);
                self.reconcile(final_path, expected)
            }
            Err(e) => {
                let _ = fs::remove_file(tmp);
                Err(CacheError::io(final_path, e))
            }
        }
    }

    /// Waits for a competing entry at `path` to reach `expected` bytes.
    ///
    /// Polls up to `race_retries` times, `race_interval` apart.
    fn reconcile(&self, path: &Path, expected: u64) -> Result<(), CacheError> {
        let size = || fs::metadata(path).map(|m| m.len()).ok();
        let mut found = size();
        for _ in 0..self.config.race_retries {
            if found == Some(expected) {
                break;
            }
            thread::sleep(self.config.race_interval());
            found = size();
        }

        if found == Some(expected) {
            self.hooks.debug(format_args!(
                "{} already committed by another writer",
                path.display()
            ));
            return Ok(());
        }

        let found = found.unwrap_or(0);
        self.hooks.warn(format_args!(
            "abandoning write to {}: competing entry is {found} bytes, ours is {expected}",
            path.display()
        ));
        Err(CacheError::WriteRace {
            path: path.to_path_buf(),
            expected,
            found,
        })
    }
}

/// Writes all of `bytes` to a new file at `path` and flushes it to disk.
fn write_whole(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_data()
}

/// Moves `tmp` to `dest` without ever replacing an existing `dest`.
///
/// Fails with [`io::ErrorKind::AlreadyExists`] if `dest` exists.
fn publish(tmp: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(tmp, dest) {
        Ok(()) => {
            let _ = fs::remove_file(tmp);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(_) => {
            // No hard links on this filesystem; a rename is atomic but can
            // replace, so check first.
            if dest.exists() {
                return Err(io::ErrorKind::AlreadyExists.into());
            }
            fs::rename(tmp, dest)
        }
    }
}
