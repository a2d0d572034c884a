//! Shared fixtures for prep cache integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use prep_cache::{CacheConfig, Matrix4, PrepCodec, PrepCompute, RawObject, SerializedPrep};

/// Serializer version tag written by [`TestBackend`].
pub const TEST_VERSION: &str = "test-prep-1";

/// A stand-in prep backend whose prep data is the object bytes, expanded.
///
/// Counts how often prep data is computed so tests can tell hits from misses.
#[derive(Default)]
pub struct TestBackend {
    pub computes: AtomicUsize,
    pub fail_compute: bool,
    pub fail_serialize: bool,
    pub version: Option<&'static str>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn computes(&self) -> usize {
        self.computes.load(Ordering::SeqCst)
    }

    fn tag(&self) -> &'static str {
        self.version.unwrap_or(TEST_VERSION)
    }
}

/// The prep data [`TestBackend`] derives for `raw`.
pub fn expected_prep(raw: &[u8]) -> Vec<u8> {
    raw.iter().rev().copied().cycle().take(raw.len() * 64).collect()
}

impl PrepCodec for TestBackend {
    type Prep = Vec<u8>;

    fn serialize(&self, prep: &Vec<u8>) -> Result<SerializedPrep, String> {
        if self.fail_serialize {
            return Err("serializer unavailable".to_string());
        }
        Ok(SerializedPrep {
            payload: prep.clone(),
            version: self.tag().to_string(),
        })
    }

    fn deserialize(&self, payload: &[u8], version: &str) -> Result<Vec<u8>, String> {
        if version != self.tag() {
            return Err(format!("unexpected version {version}"));
        }
        Ok(payload.to_vec())
    }

    fn accepts_version(&self, version: &str) -> bool {
        version == self.tag()
    }
}

impl PrepCompute for TestBackend {
    fn compute(&self, _matrix: Option<&Matrix4>, raw: &RawObject<'_>) -> Option<Vec<u8>> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        if self.fail_compute {
            return None;
        }
        Some(expected_prep(raw.bytes))
    }
}

/// A config rooted at `root` with a fast write-race backoff.
pub fn fast_config(root: &Path) -> CacheConfig {
    CacheConfig {
        race_retries: 3,
        race_interval_ms: 10,
        ..CacheConfig::at(root)
    }
}

/// Every file under `<root>/objects`, sorted.
pub fn object_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(shards) = fs::read_dir(root.join("objects")) else {
        return out;
    };
    for shard in shards.flatten() {
        if let Ok(entries) = fs::read_dir(shard.path()) {
            out.extend(entries.flatten().map(|e| e.path()));
        }
    }
    out.sort();
    out
}
