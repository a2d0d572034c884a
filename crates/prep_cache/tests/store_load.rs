//! Store/load behavior against a real cache directory.

mod common;

use std::fs;
use std::path::Path;

use common::{expected_prep, fast_config, object_files, TestBackend, TEST_VERSION};
use prep_cache::container::Container;
use prep_cache::{CacheError, CacheHandle, FailureKind, MissReason, ObjectName, RawObject};

const NAME_A: &str = "AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA";

fn name_a() -> ObjectName {
    ObjectName::parse(NAME_A).unwrap()
}

fn sphere() -> RawObject<'static> {
    RawObject::new("sph.s", b"sphere V=(0,0,0) r=25").with_source_path(Path::new("/models/moss.g"))
}

#[test]
fn store_then_load_returns_same_prep() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend::new();
    let prep = expected_prep(sphere().bytes);

    cache.store(&name_a(), &sphere(), &prep, &backend).unwrap();
    assert_eq!(cache.load(&name_a(), &backend), Some(prep));

    let files = object_files(dir.path());
    assert_eq!(files.len(), 1, "{files:?}");
    assert_eq!(files[0], dir.path().join("objects").join("AA").join(NAME_A));
}

#[test]
fn store_warms_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend::new();

    cache
        .store(&name_a(), &sphere(), &b"prep".to_vec(), &backend)
        .unwrap();
    assert!(cache.contains(&name_a()));
    assert_eq!(cache.entry_count(), 1);
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let backend = TestBackend::new();
    let prep = expected_prep(b"torus");
    {
        let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
        cache.store(&name_a(), &sphere(), &prep, &backend).unwrap();
        assert_eq!(cache.close(), 1);
    }

    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    assert_eq!(cache.entry_count(), 0);
    assert_eq!(cache.load(&name_a(), &backend), Some(prep));
    assert_eq!(cache.entry_count(), 1);
}

#[test]
fn envelope_records_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend::new();
    cache
        .store(&name_a(), &sphere(), &b"prep".to_vec(), &backend)
        .unwrap();

    let bytes = fs::read(cache.paths().object_file(&name_a())).unwrap();
    let container = Container::parse(&bytes).unwrap();
    let env = &container.envelope;
    assert_eq!(env.name, NAME_A);
    assert_eq!(env.get("mime_type"), Some("application/x-prep-cache"));
    assert_eq!(env.get("prep_version"), Some(TEST_VERSION));
    assert_eq!(env.get("source_object"), Some("sph.s"));
    assert_eq!(env.get("source_path"), Some("/models/moss.g"));
    assert_eq!(&container.body[..4], &4u32.to_be_bytes());
}

#[test]
fn never_stored_name_misses_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend::new();

    assert!(cache.load(&name_a(), &backend).is_none());
    let err = cache.try_load(&name_a(), &backend).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Miss {
            reason: MissReason::Absent,
            ..
        }
    ));
    assert_eq!(err.kind(), FailureKind::Miss);

    assert!(object_files(dir.path()).is_empty());
    assert!(!cache.paths().object_dir(&name_a()).exists());
    assert_eq!(cache.entry_count(), 0);
}

#[test]
fn corrupt_body_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let backend = TestBackend::new();
    let path = {
        let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
        cache
            .store(&name_a(), &sphere(), &expected_prep(sphere().bytes), &backend)
            .unwrap();
        let path = cache.paths().object_file(&name_a());
        cache.close();
        path
    };

    let mut bytes = fs::read(&path).unwrap();
    let body_len = Container::parse(&bytes).unwrap().body.len();
    let body_start = bytes.len() - body_len;
    for b in &mut bytes[body_start + 4..] {
        *b = !*b;
    }
    fs::write(&path, &bytes).unwrap();

    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let err = cache.try_load(&name_a(), &backend).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Miss {
            reason: MissReason::ChecksumMismatch,
            ..
        }
    ));
    assert!(cache.load(&name_a(), &backend).is_none());
    assert_eq!(cache.entry_count(), 0, "a bad entry is not kept mapped");
}

#[test]
fn empty_entry_file_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let file = cache.paths().object_file(&name_a());
    prep_cache::store::ensure_path(&file, true).unwrap();

    let err = cache.try_load(&name_a(), &TestBackend::new()).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Miss {
            reason: MissReason::Empty,
            ..
        }
    ));
    assert_eq!(cache.entry_count(), 0);
}

#[test]
fn other_serializer_version_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let old = TestBackend {
        version: Some("test-prep-0"),
        ..TestBackend::new()
    };
    cache
        .store(&name_a(), &sphere(), &b"old layout".to_vec(), &old)
        .unwrap();

    let err = cache.try_load(&name_a(), &TestBackend::new()).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Miss {
            reason: MissReason::VersionMismatch,
            ..
        }
    ));
}

#[test]
fn entry_copied_to_another_name_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend::new();
    cache
        .store(&name_a(), &sphere(), &b"prep".to_vec(), &backend)
        .unwrap();

    let other = ObjectName::parse("AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAB").unwrap();
    fs::copy(
        cache.paths().object_file(&name_a()),
        cache.paths().object_file(&other),
    )
    .unwrap();
    let err = cache.try_load(&other, &backend).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Miss {
            reason: MissReason::NameMismatch,
            ..
        }
    ));
}

#[test]
fn serializer_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend {
        fail_serialize: true,
        ..TestBackend::new()
    };
    let err = cache
        .store(&name_a(), &sphere(), &b"prep".to_vec(), &backend)
        .unwrap_err();
    assert!(matches!(err, CacheError::Codec { .. }));
    assert!(object_files(dir.path()).is_empty());
}

#[test]
fn empty_version_tag_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend {
        version: Some(""),
        ..TestBackend::new()
    };
    assert!(cache
        .store(&name_a(), &sphere(), &b"prep".to_vec(), &backend)
        .is_err());
    assert!(object_files(dir.path()).is_empty());
}

#[test]
fn read_only_handle_refuses_store() {
    let dir = tempfile::tempdir().unwrap();
    CacheHandle::open(&fast_config(dir.path())).unwrap();
    let config = prep_cache::CacheConfig {
        read_only: true,
        ..fast_config(dir.path())
    };
    let cache = CacheHandle::open(&config).unwrap();
    let err = cache
        .store(&name_a(), &sphere(), &b"prep".to_vec(), &TestBackend::new())
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unavailable);
    assert!(object_files(dir.path()).is_empty());
}

#[test]
fn generated_names_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    let backend = TestBackend::new();

    let raws = [
        RawObject::new("a.s", b"arb8 0 0 0 1 0 0"),
        RawObject::new("b.s", b"ell 0 0 0 1 2 3"),
        RawObject::new("c.s", b"tor 0 0 0 5 1"),
    ];
    for raw in &raws {
        let name = ObjectName::generate(None, raw).unwrap();
        cache
            .store(&name, raw, &expected_prep(raw.bytes), &backend)
            .unwrap();
    }
    cache.close();

    let cache = CacheHandle::open(&fast_config(dir.path())).unwrap();
    for raw in &raws {
        let name = ObjectName::generate(None, raw).unwrap();
        assert_eq!(cache.load(&name, &backend), Some(expected_prep(raw.bytes)));
    }
    assert_eq!(object_files(dir.path()).len(), raws.len());
}
