//! Tests for catalog lifecycle and point lookups
//!
//! These tests verify:
//! - Open/refresh/close semantics over a store directory
//! - Newest-first segment ordering by path generation
//! - Point lookup shadowing and the tombstone-payload behavior
//! - Refresh reconciliation: additions, in-place reopens, vanished files

mod common;

use common::{segment_path, write_segment, write_value_segment, Entry};
use shale::{Config, CursorCache, SegmentCatalog, ShaleError};
use tempfile::TempDir;

fn open(dir: &TempDir) -> SegmentCatalog {
    SegmentCatalog::open(dir.path(), Config::default()).unwrap()
}

fn get(catalog: &SegmentCatalog, cache: &mut CursorCache, key: &[u8]) -> Option<Vec<u8>> {
    catalog.get(cache, key).unwrap()
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn test_open_missing_dir_is_not_found() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let result = SegmentCatalog::open(&missing, Config::default());
    assert!(matches!(result, Err(ShaleError::NotFound(_))));
}

#[test]
fn test_open_dir_without_segments_is_empty() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("notes.txt"), b"not a segment").unwrap();

    let result = SegmentCatalog::open(temp.path(), Config::default());
    assert!(matches!(result, Err(ShaleError::Empty(_))));
}

#[test]
fn test_open_skips_unreadable_segment_files() {
    let temp = TempDir::new().unwrap();
    write_value_segment(&segment_path(temp.path(), 1), 1, &[(b"k", b"v")]);
    std::fs::write(segment_path(temp.path(), 2), b"GARBAGE_NOT_A_TABLE").unwrap();

    let catalog = open(&temp);
    assert_eq!(catalog.segment_count(), 1);

    let mut cache = CursorCache::new();
    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"v".to_vec()));
}

#[test]
fn test_open_orders_segments_newest_first() {
    let temp = TempDir::new().unwrap();
    // Create the newer generation first to prove load order is irrelevant
    write_value_segment(&segment_path(temp.path(), 7), 7, &[(b"k", b"newest")]);
    write_value_segment(&segment_path(temp.path(), 3), 3, &[(b"k", b"older")]);

    let catalog = open(&temp);
    assert_eq!(catalog.segment_count(), 2);
    assert_eq!(catalog.segments()[0].path(), segment_path(temp.path(), 7));

    let mut cache = CursorCache::new();
    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"newest".to_vec()));
}

// =============================================================================
// Point Lookup
// =============================================================================

#[test]
fn test_lookup_single_segment() {
    let temp = TempDir::new().unwrap();
    write_value_segment(
        &segment_path(temp.path(), 1),
        1,
        &[(b"apple", b"1"), (b"banana", b"2"), (b"cherry", b"3")],
    );

    let catalog = open(&temp);
    let mut cache = CursorCache::new();

    assert_eq!(get(&catalog, &mut cache, b"banana"), Some(b"2".to_vec()));
    assert_eq!(get(&catalog, &mut cache, b"apple"), Some(b"1".to_vec()));
    assert_eq!(get(&catalog, &mut cache, b"durian"), None);
}

#[test]
fn test_lookup_newest_segment_shadows_older() {
    let temp = TempDir::new().unwrap();
    write_value_segment(&segment_path(temp.path(), 1), 1, &[(b"k", b"v1")]);
    write_value_segment(&segment_path(temp.path(), 2), 2, &[(b"k", b"v2")]);
    write_value_segment(&segment_path(temp.path(), 3), 3, &[(b"other", b"x")]);

    let catalog = open(&temp);
    let mut cache = CursorCache::new();

    // Generation 3 does not hold the key; generation 2 wins over 1
    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"v2".to_vec()));
}

#[test]
fn test_lookup_returns_tombstone_payload() {
    // Point lookup does not inspect the record type: a deletion marker's
    // stored payload comes back as the value. Only merge scans filter
    // tombstones.
    let temp = TempDir::new().unwrap();
    write_value_segment(&segment_path(temp.path(), 1), 1, &[(b"k", b"live")]);
    write_segment(
        &segment_path(temp.path(), 2),
        2,
        &[(b"k", Entry::Tombstone(b"stale"))],
    );

    let catalog = open(&temp);
    let mut cache = CursorCache::new();

    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"stale".to_vec()));
}

#[test]
fn test_lookup_cache_survives_repeated_calls() {
    let temp = TempDir::new().unwrap();
    let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..100)
        .map(|i| {
            (
                format!("key{:05}", i).into_bytes(),
                format!("value{}", i).into_bytes(),
            )
        })
        .collect();
    let borrowed: Vec<(&[u8], &[u8])> = entries
        .iter()
        .map(|(k, v)| (k.as_slice(), v.as_slice()))
        .collect();
    write_value_segment(&segment_path(temp.path(), 1), 1, &borrowed);

    let catalog = open(&temp);
    let mut cache = CursorCache::new();

    // Out-of-order probes through one cache
    for i in [40, 7, 99, 0, 63, 7] {
        let key = format!("key{:05}", i);
        let expected = format!("value{}", i);
        assert_eq!(
            get(&catalog, &mut cache, key.as_bytes()),
            Some(expected.into_bytes())
        );
    }
}

// =============================================================================
// Refresh
// =============================================================================

#[test]
fn test_refresh_without_changes_reports_false() {
    let temp = TempDir::new().unwrap();
    write_value_segment(&segment_path(temp.path(), 1), 1, &[(b"k", b"v")]);

    let mut catalog = open(&temp);
    assert!(!catalog.refresh(temp.path()));
    assert!(!catalog.refresh(temp.path()));
}

#[test]
fn test_refresh_discovers_new_segment() {
    let temp = TempDir::new().unwrap();
    write_value_segment(&segment_path(temp.path(), 1), 1, &[(b"k", b"v1")]);

    let mut catalog = open(&temp);
    let mut cache = CursorCache::new();
    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"v1".to_vec()));

    write_value_segment(&segment_path(temp.path(), 2), 2, &[(b"k", b"v2")]);
    assert!(catalog.refresh(temp.path()));
    assert_eq!(catalog.segment_count(), 2);

    // The new generation shadows the old one
    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"v2".to_vec()));
}

#[test]
fn test_refresh_reopens_resized_segment_in_place() {
    let temp = TempDir::new().unwrap();
    let path = segment_path(temp.path(), 1);
    write_value_segment(&path, 1, &[(b"a", b"1")]);

    let mut catalog = open(&temp);
    let mut cache = CursorCache::new();
    assert_eq!(get(&catalog, &mut cache, b"b"), None);

    // Same path, new content, different size
    write_value_segment(&path, 2, &[(b"a", b"1"), (b"b", b"2-and-longer")]);
    assert!(catalog.refresh(temp.path()));
    assert_eq!(catalog.segment_count(), 1);

    // The segment count did not change, so an existing cache may still hold
    // a cursor into the replaced reader; a fresh cache sees the new data
    let mut fresh = CursorCache::new();
    assert_eq!(get(&catalog, &mut fresh, b"b"), Some(b"2-and-longer".to_vec()));
}

#[cfg(unix)]
#[test]
fn test_refresh_keeps_vanished_segment() {
    let temp = TempDir::new().unwrap();
    let path = segment_path(temp.path(), 1);
    write_value_segment(&path, 1, &[(b"k", b"v")]);

    let mut catalog = open(&temp);
    std::fs::remove_file(&path).unwrap();

    // The vanished file is left in the catalog and keeps serving reads
    // through its still-open handle
    assert!(!catalog.refresh(temp.path()));
    assert_eq!(catalog.segment_count(), 1);

    let mut cache = CursorCache::new();
    assert_eq!(get(&catalog, &mut cache, b"k"), Some(b"v".to_vec()));
}

#[test]
fn test_refresh_missing_dir_reports_false() {
    let temp = TempDir::new().unwrap();
    write_value_segment(&segment_path(temp.path(), 1), 1, &[(b"k", b"v")]);

    let mut catalog = open(&temp);
    let gone = temp.path().join("gone");
    assert!(!catalog.refresh(&gone));
    assert_eq!(catalog.segment_count(), 1);
}
