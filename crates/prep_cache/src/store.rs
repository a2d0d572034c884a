//! Entry paths and the in-process table of mapped entries.
//!
//! Entries live at `<root>/objects/<first two chars of name>/<name>`. The
//! two-character shard keeps per-directory entry counts bounded.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::Mmap;

use crate::error::MissReason;
use crate::name::ObjectName;

/// Subdirectory of the root holding all entries.
pub const OBJECTS_DIR: &str = "objects";

/// A read-only mapping of one committed entry.
pub struct CacheEntry {
    map: Mmap,
}

impl CacheEntry {
    /// Maps the entry file at `path`.
    pub(crate) fn open(path: &Path) -> Result<Self, MissReason> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(MissReason::Absent),
            Err(_) => return Err(MissReason::MapFailed),
        };
        let len = file.metadata().map_err(|_| MissReason::MapFailed)?.len();
        if len == 0 {
            return Err(MissReason::Empty);
        }
        // SAFETY: committed entries are published by an atomic link or rename
        // and are never written in place afterwards, so the mapped bytes do not
        // change underneath us.
        let map = unsafe { Mmap::map(&file) }.map_err(|_| MissReason::MapFailed)?;
        Ok(Self { map })
    }

    /// The mapped bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Path layout of a cache root plus the table of entries mapped so far.
///
/// The table mutex guards only the in-memory bookkeeping; no disk I/O is
/// performed while it is held.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    entries: Mutex<HashMap<ObjectName, Arc<CacheEntry>>>,
}

impl CacheStore {
    /// Creates an empty store rooted at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/objects`.
    pub fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    /// The shard directory holding `name`.
    pub fn object_dir(&self, name: &ObjectName) -> PathBuf {
        self.objects_dir().join(name.shard())
    }

    /// The entry file for `name`.
    pub fn object_file(&self, name: &ObjectName) -> PathBuf {
        self.object_dir(name).join(name.as_str())
    }

    /// Returns the mapped entry for `name`, if this process has one.
    pub(crate) fn cached(&self, name: &ObjectName) -> Option<Arc<CacheEntry>> {
        self.table().get(name).cloned()
    }

    /// Records a freshly mapped entry.
    ///
    /// If another thread inserted `name` first, its entry is kept and returned
    /// and `entry` is dropped.
    pub(crate) fn insert(&self, name: &ObjectName, entry: CacheEntry) -> Arc<CacheEntry> {
        Arc::clone(
            self.table()
                .entry(name.clone())
                .or_insert_with(|| Arc::new(entry)),
        )
    }

    /// Drops `entry` from the table if it is still the one recorded for `name`.
    pub(crate) fn evict(&self, name: &ObjectName, entry: &Arc<CacheEntry>) {
        let mut table = self.table();
        if table.get(name).is_some_and(|e| Arc::ptr_eq(e, entry)) {
            table.remove(name);
        }
    }

    /// Number of entries mapped by this process.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns `true` if no entries are mapped.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Returns `true` if `name` is mapped by this process.
    pub fn contains(&self, name: &ObjectName) -> bool {
        self.table().contains_key(name)
    }

    /// Unmaps every entry, returning how many were released.
    ///
    /// Mappings still borrowed through an outstanding `Arc` are unmapped when
    /// the last clone drops.
    pub fn release_all(&self) -> usize {
        let mut table = self.table();
        let n = table.len();
        table.clear();
        n
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ObjectName, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates `path` and any missing ancestors.
///
/// With `is_file`, the parent directories are created and an empty file is
/// touched at `path` (an existing file is left untouched). Succeeds if the
/// target already exists.
pub fn ensure_path(path: &Path, is_file: bool) -> io::Result<()> {
    if !is_file {
        return fs::create_dir_all(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
}

/// Returns `true` if a file can be created in `dir`.
///
/// Probes by creating and removing a uniquely named file, which reflects
/// mount flags and ACLs as well as permission bits.
pub fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(format!(".probe.{}", unique_suffix()));
    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// `<pid>.<thread>.<nanos>`, unique per process, thread, and moment.
pub(crate) fn unique_suffix() -> String {
    let pid = std::process::id();
    let thread = thread_number();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{pid}.{thread}.{nanos}")
}

/// A small number identifying the calling thread within this process.
///
/// Assigned on first use from a process-wide counter and never reused.
fn thread_number() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    thread_local! {
        static NUMBER: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    NUMBER.with(|n| *n)
}
