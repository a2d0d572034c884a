//! Cache root validation and on-disk format versioning.
//!
//! The root carries a `format` marker holding a single integer. Entries under
//! `objects/` are only trusted when the marker equals [`FORMAT_VERSION`].
//! Older layouts are purged and reinitialized; newer ones disable the cache,
//! since there is no downgrade path.

use std::fs;
use std::io;
use std::path::Path;

use uuid::Uuid;

use crate::error::CacheError;
use crate::hooks::Hooks;
use crate::store::{ensure_path, is_writable, unique_suffix, OBJECTS_DIR};

/// The on-disk format written by this code.
pub const FORMAT_VERSION: u32 = 3;

/// Name of the format marker file under the root.
pub const FORMAT_FILE: &str = "format";

/// The single-file cache used by format 0.
const LEGACY_CACHE_FILE: &str = "cache.db";

/// How a validated root may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Entries can be read and written.
    ReadWrite,
    /// Entries can only be read.
    ReadOnly,
}

/// Validates `root`, initializing or migrating it as needed.
///
/// Returns [`CacheError::Unavailable`] when the cache cannot be used at all
/// by this process: the root cannot be created, is not a readable directory,
/// carries an unreadable or newer marker, or needs initialization or
/// migration while read-only.
pub fn prepare_root(
    root: &Path,
    force_read_only: bool,
    hooks: &Hooks,
) -> Result<Access, CacheError> {
    match fs::metadata(root) {
        Ok(meta) if !meta.is_dir() => {
            return Err(CacheError::unavailable(format!(
                "{} exists but is not a directory",
                root.display()
            )));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound && !force_read_only => {
            ensure_path(root, false).map_err(|e| {
                CacheError::unavailable(format!("cannot create {}: {e}", root.display()))
            })?;
            hooks.debug(format_args!("created cache root {}", root.display()));
        }
        Err(e) => {
            return Err(CacheError::unavailable(format!(
                "cannot access {}: {e}",
                root.display()
            )));
        }
    }

    if let Err(e) = fs::read_dir(root) {
        return Err(CacheError::unavailable(format!(
            "{} is not readable: {e}",
            root.display()
        )));
    }

    let writable = !force_read_only && is_writable(root);
    if !writable && !force_read_only {
        hooks.warn(format_args!(
            "cache root {} is not writable, using it read-only",
            root.display()
        ));
    }

    match read_marker(root)? {
        None if writable => write_marker(root)?,
        None => {
            return Err(CacheError::unavailable(
                "read-only cache root has no format marker",
            ));
        }
        Some(FORMAT_VERSION) => {}
        Some(found) if found < FORMAT_VERSION => {
            if !writable {
                return Err(CacheError::unavailable(format!(
                    "format {found} needs migration but the root is read-only"
                )));
            }
            hooks.warn(format_args!(
                "migrating cache at {} from format {found} to {FORMAT_VERSION}; \
                 existing entries are discarded",
                root.display()
            ));
            migrate(root, found)?;
        }
        Some(found) => {
            return Err(CacheError::unavailable(format!(
                "format {found} is newer than supported format {FORMAT_VERSION}"
            )));
        }
    }

    if writable {
        ensure_path(&root.join(OBJECTS_DIR), false).map_err(|e| {
            CacheError::unavailable(format!("cannot create objects directory: {e}"))
        })?;
        Ok(Access::ReadWrite)
    } else {
        Ok(Access::ReadOnly)
    }
}

/// Reads the format marker; `None` if there is none.
pub fn read_marker(root: &Path) -> Result<Option<u32>, CacheError> {
    let text = match fs::read_to_string(root.join(FORMAT_FILE)) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CacheError::unavailable(format!(
                "format marker is unreadable: {e}"
            )));
        }
    };
    let text = text.trim();
    text.parse().map(Some).map_err(|_| {
        CacheError::unavailable(format!("format marker {text:?} is not a version"))
    })
}

/// Stamps the root with [`FORMAT_VERSION`].
///
/// Written through a temp file and a rename so concurrent initializers never
/// expose a half-written marker.
fn write_marker(root: &Path) -> Result<(), CacheError> {
    let marker = root.join(FORMAT_FILE);
    let tmp = root.join(format!("{FORMAT_FILE}.{}", unique_suffix()));
    let result =
        fs::write(&tmp, format!("{FORMAT_VERSION}\n")).and_then(|()| fs::rename(&tmp, &marker));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::unavailable(format!(
            "cannot write format marker: {e}"
        )));
    }
    Ok(())
}

/// Purges a cache written in format `from` and stamps the current format.
fn migrate(root: &Path, from: u32) -> Result<(), CacheError> {
    let purge = |what: &str, result: io::Result<()>| match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::unavailable(format!(
            "migration from format {from} failed removing {what}: {e}"
        ))),
    };

    match from {
        0 => {
            purge(LEGACY_CACHE_FILE, fs::remove_file(root.join(LEGACY_CACHE_FILE)))?;
            purge(FORMAT_FILE, fs::remove_file(root.join(FORMAT_FILE)))?;
        }
        _ => {
            // Formats 1 and 2 kept one directory per object, named by its UUID.
            let entries = fs::read_dir(root).map_err(|e| {
                CacheError::unavailable(format!("migration cannot list {}: {e}", root.display()))
            })?;
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
                if is_dir && is_legacy_object_dir(name) {
                    purge(name, fs::remove_dir_all(entry.path()))?;
                }
            }
        }
    }

    purge(OBJECTS_DIR, fs::remove_dir_all(root.join(OBJECTS_DIR)))?;
    write_marker(root)
}

fn is_legacy_object_dir(name: &str) -> bool {
    name.len() == 36 && Uuid::try_parse(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hooks() -> Hooks {
        Hooks::default()
    }

    #[test]
    fn creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("cache");
        assert_eq!(prepare_root(&root, false, &hooks()).unwrap(), Access::ReadWrite);
        assert_eq!(read_marker(&root).unwrap(), Some(FORMAT_VERSION));
        assert!(root.join(OBJECTS_DIR).is_dir());
    }

    #[test]
    fn reopen_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        prepare_root(dir.path(), false, &hooks()).unwrap();
        prepare_root(dir.path(), false, &hooks()).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2, "only marker and objects dir: {names:?}");
    }

    #[test]
    fn file_as_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        fs::write(&root, b"x").unwrap();
        let err = prepare_root(&root, false, &hooks()).unwrap_err();
        assert!(matches!(err, CacheError::Unavailable { .. }));
    }

    #[test]
    fn newer_marker_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FORMAT_FILE), format!("{}\n", FORMAT_VERSION + 1)).unwrap();
        let err = prepare_root(dir.path(), false, &hooks()).unwrap_err();
        assert!(err.to_string().contains("newer"));
        // No downgrade: the marker is left alone.
        assert_eq!(read_marker(dir.path()).unwrap(), Some(FORMAT_VERSION + 1));
    }

    #[test]
    fn garbage_marker_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FORMAT_FILE), "three").unwrap();
        assert!(prepare_root(dir.path(), false, &hooks()).is_err());
    }

    #[test]
    fn migrates_format_zero() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FORMAT_FILE), "0").unwrap();
        fs::write(dir.path().join(LEGACY_CACHE_FILE), b"legacy blob").unwrap();

        assert_eq!(prepare_root(dir.path(), false, &hooks()).unwrap(), Access::ReadWrite);
        assert!(!dir.path().join(LEGACY_CACHE_FILE).exists());
        assert_eq!(read_marker(dir.path()).unwrap(), Some(FORMAT_VERSION));
        assert_eq!(fs::read_dir(dir.path().join(OBJECTS_DIR)).unwrap().count(), 0);
    }

    #[test]
    fn migrates_per_object_directories() {
        for version in [1, 2] {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join(FORMAT_FILE), version.to_string()).unwrap();
            let legacy = dir.path().join("5f1c8a3e-2b4d-5c6e-8f70-123456789abc");
            fs::create_dir_all(legacy.join("sub")).unwrap();
            fs::write(legacy.join("sub").join("prep"), b"old").unwrap();
            let unrelated = dir.path().join("notes");
            fs::create_dir(&unrelated).unwrap();
            let stale_objects = dir.path().join(OBJECTS_DIR).join("ab");
            fs::create_dir_all(&stale_objects).unwrap();
            fs::write(stale_objects.join("stale"), b"mixed").unwrap();

            prepare_root(dir.path(), false, &hooks()).unwrap();

            assert!(!legacy.exists(), "format {version}");
            assert!(unrelated.exists(), "format {version}");
            assert!(!stale_objects.exists(), "format {version}");
            assert_eq!(read_marker(dir.path()).unwrap(), Some(FORMAT_VERSION));
            assert!(dir.path().join(OBJECTS_DIR).is_dir());
        }
    }

    #[test]
    fn failed_migration_disables_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FORMAT_FILE), "1").unwrap();
        // A regular file where the objects directory belongs cannot be purged.
        fs::write(dir.path().join(OBJECTS_DIR), b"in the way").unwrap();

        let err = prepare_root(dir.path(), false, &hooks()).unwrap_err();
        assert!(matches!(err, CacheError::Unavailable { .. }), "{err:?}");
        assert_eq!(read_marker(dir.path()).unwrap(), Some(1));
    }

    #[test]
    fn forced_read_only_needs_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare_root(dir.path(), true, &hooks()).is_err());

        prepare_root(dir.path(), false, &hooks()).unwrap();
        assert_eq!(prepare_root(dir.path(), true, &hooks()).unwrap(), Access::ReadOnly);
    }

    #[test]
    fn forced_read_only_never_migrates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FORMAT_FILE), "1").unwrap();
        assert!(prepare_root(dir.path(), true, &hooks()).is_err());
        assert_eq!(read_marker(dir.path()).unwrap(), Some(1));
    }

    #[test]
    fn forced_read_only_does_not_create_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("absent");
        assert!(prepare_root(&root, true, &hooks()).is_err());
        assert!(!root.exists());
    }

    #[test]
    fn legacy_dir_pattern() {
        assert!(is_legacy_object_dir("5f1c8a3e-2b4d-5c6e-8f70-123456789abc"));
        assert!(!is_legacy_object_dir("objects"));
        assert!(!is_legacy_object_dir("5f1c8a3e2b4d5c6e8f70123456789abc"));
    }
}
