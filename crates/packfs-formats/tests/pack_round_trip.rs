#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for building and reading packs
//!
//! Trees are written to temporary directories, packed, reopened and compared
//! against the source files.

use packfs_formats::adler32;
use packfs_formats::pack::{
    EntryKind, HEADER_SIZE, PackError, PackOpenOptions, PackReader, PackWriter, RECORD_SIZE,
    ROOT_INDEX, build_pack, scan_tree,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Write `files` (relative path -> content) below `root`
fn write_tree(root: &Path, files: &BTreeMap<String, Vec<u8>>) {
    for (path, data) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, data).unwrap();
    }
}

fn sample_files() -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    files.insert("readme.txt".to_string(), b"hello pack".to_vec());
    files.insert("a/b/c".to_string(), b"deep content".to_vec());
    files.insert("a/empty.bin".to_string(), Vec::new());
    files.insert("a/b/d.dat".to_string(), (0..=255u8).cycle().take(10_000).collect());
    files.insert("textures/grass.png".to_string(), vec![0x89, b'P', b'N', b'G']);
    files.insert("sounds/ünïcødé.ogg".to_string(), b"sound".to_vec());
    files
}

/// Build a pack of `files` and return (tempdir, pack path)
fn packed(files: &BTreeMap<String, Vec<u8>>) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("Operation should succeed");
    let source = dir.path().join("source");
    fs::create_dir(&source).unwrap();
    write_tree(&source, files);
    let pack = dir.path().join("out.pac");
    build_pack(&source, &pack).expect("Operation should succeed");
    (dir, pack)
}

fn both_modes() -> [PackOpenOptions; 2] {
    [
        PackOpenOptions::default(),
        PackOpenOptions::default().with_mmap(false),
    ]
}

#[test]
fn round_trip_preserves_paths_and_bytes() {
    let files = sample_files();
    let (_dir, pack) = packed(&files);

    for options in both_modes() {
        let reader = PackReader::open(&pack, &options).expect("Operation should succeed");

        let listed: BTreeMap<String, Vec<u8>> = reader
            .file_paths()
            .into_iter()
            .map(|(path, index)| (path, reader.read_entry(index).unwrap()))
            .collect();
        assert_eq!(listed, files);

        for (path, data) in &files {
            let index = reader.resolve(path).unwrap_or_else(|| panic!("missing {path}"));
            assert_eq!(reader.record(index).unwrap().kind, EntryKind::File);
            assert_eq!(&reader.read_entry(index).unwrap(), data);
        }
    }
}

#[test]
fn child_ranges_hold_immediate_children_only() {
    let (_dir, pack) = packed(&sample_files());
    let reader = PackReader::open(&pack, &PackOpenOptions::default()).unwrap();

    let mut seen = HashSet::new();
    for (index, record) in reader.records().iter().enumerate() {
        if !record.is_directory() {
            continue;
        }
        for child in reader.children(index) {
            assert!(child > index, "child {child} precedes parent {index}");
            assert!(seen.insert(child), "record {child} claimed by two directories");
        }
    }
    // Every record except the root has exactly one parent
    assert_eq!(seen.len(), reader.entry_count() - 1);
    assert!(!seen.contains(&ROOT_INDEX));

    let a = reader.resolve("a").unwrap();
    let names: Vec<String> = reader.children(a).map(|i| reader.name(i)).collect();
    assert_eq!(names, vec!["b", "empty.bin"]);
}

#[test]
fn resolution_rules() {
    let (_dir, pack) = packed(&sample_files());
    let reader = PackReader::open(&pack, &PackOpenOptions::default()).unwrap();

    assert_eq!(reader.resolve(""), Some(ROOT_INDEX));
    assert_eq!(reader.resolve("/"), Some(ROOT_INDEX));
    assert_eq!(reader.resolve("/a/b/c"), reader.resolve("a/b/c"));
    assert_eq!(reader.resolve("a/b/missing"), None);
    // Cannot descend through a file
    assert_eq!(reader.resolve("readme.txt/x"), None);
    // Comparison is exact, not prefix based
    assert_eq!(reader.resolve("a/b/c.txt"), None);
    assert_eq!(reader.resolve("A"), None);
    assert!(reader.resolve("sounds/ünïcødé.ogg").is_some());
}

#[test]
fn positioned_reads_clamp_at_end_of_file() {
    let (_dir, pack) = packed(&sample_files());

    for options in both_modes() {
        let reader = PackReader::open(&pack, &options).unwrap();
        let index = reader.resolve("a/b/c").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read_at(index, 5, &mut buf).unwrap(), 7);
        assert_eq!(&buf[..7], b"content");
        assert_eq!(reader.read_at(index, 12, &mut buf).unwrap(), 0);
        assert_eq!(reader.read_at(index, 1_000, &mut buf).unwrap(), 0);

        let dir = reader.resolve("a").unwrap();
        assert!(matches!(
            reader.read_at(dir, 0, &mut buf),
            Err(PackError::InvalidRecord { .. })
        ));
    }
}

#[test]
fn concurrent_reads_do_not_interfere() {
    let (_dir, pack) = packed(&sample_files());

    for options in both_modes() {
        let reader = Arc::new(PackReader::open(&pack, &options).unwrap());
        let big = reader.resolve("a/b/d.dat").unwrap();
        let expected: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let reader = Arc::clone(&reader);
                let expected = expected.clone();
                std::thread::spawn(move || {
                    for round in 0..50u64 {
                        let offset = (thread * 997 + round * 131) % 9_000;
                        let mut buf = [0u8; 512];
                        let n = reader.read_at(big, offset, &mut buf).unwrap();
                        let start = offset as usize;
                        assert_eq!(&buf[..n], &expected[start..start + n]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

#[test]
fn empty_directory_packs_to_bare_root() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty");
    fs::create_dir(&source).unwrap();
    let pack = dir.path().join("empty.pac");

    let summary = build_pack(&source, &pack).unwrap();
    assert_eq!(summary.entry_count, 1);
    assert_eq!(summary.file_count, 0);

    let reader = PackReader::open(&pack, &PackOpenOptions::default().with_verify_checksum(true))
        .unwrap();
    assert_eq!(reader.entry_count(), 1);
    assert_eq!(reader.children(ROOT_INDEX).len(), 0);
    assert_eq!(reader.resolve("/"), Some(ROOT_INDEX));
}

#[test]
fn single_file_source_gets_synthetic_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("solo.txt");
    fs::write(&file, b"alone").unwrap();
    let pack = dir.path().join("solo.pac");

    build_pack(&file, &pack).unwrap();
    let reader = PackReader::open(&pack, &PackOpenOptions::default()).unwrap();

    assert_eq!(reader.entry_count(), 2);
    let index = reader.resolve("solo.txt").unwrap();
    assert_eq!(reader.read_entry(index).unwrap(), b"alone");
}

#[test]
fn summary_matches_written_file() {
    let files = sample_files();
    let (dir, _) = packed(&files);
    let source = dir.path().join("source");
    let target = dir.path().join("again.pac");

    let tree = scan_tree(&source).unwrap();
    let summary = PackWriter::new(tree).write_to_file(&target).unwrap();
    let bytes = fs::read(&target).unwrap();

    assert_eq!(summary.archive_size, bytes.len() as u64);
    assert_eq!(summary.file_count, files.len());
    assert_eq!(summary.payload_bytes, files.values().map(|d| d.len() as u64).sum::<u64>());
    assert_eq!(summary.checksum, adler32(&bytes[..bytes.len() - 4]));

    let reader = PackReader::open(&target, &PackOpenOptions::default()).unwrap();
    assert_eq!(reader.verify_checksum().unwrap(), summary.checksum);
}

/// Flip one byte at `offset` and expect checksum verification to fail
fn assert_corruption_detected(pack: &Path, offset: usize) {
    let mut bytes = fs::read(pack).unwrap();
    bytes[offset] ^= 0x01;
    let corrupt = pack.with_extension("corrupt");
    fs::write(&corrupt, &bytes).unwrap();

    for options in both_modes() {
        let result = PackReader::open(&corrupt, &options.with_verify_checksum(true));
        assert!(
            matches!(result, Err(PackError::ChecksumMismatch { .. })),
            "flip at {offset} not detected: {result:?}"
        );
        // Without verification the structural checks alone do not notice
        assert!(PackReader::open(&corrupt, &options).is_ok());
    }
}

#[test]
fn checksum_detects_corruption_in_every_region() {
    let (_dir, pack) = packed(&sample_files());
    let reader = PackReader::open(&pack, &PackOpenOptions::default()).unwrap();
    let header = reader.header().clone();
    drop(reader);

    // Header: reserved word
    assert_corruption_detected(&pack, 5);
    // Record: flags field of record 1
    assert_corruption_detected(&pack, (HEADER_SIZE + RECORD_SIZE + 4) as usize);
    // Name table: high byte of the first name unit
    assert_corruption_detected(&pack, header.name_table_offset as usize + 1);
    // Payload region
    assert_corruption_detected(&pack, header.payload_region_offset as usize + 3);
}

#[test]
fn malformed_headers_are_rejected() {
    let (dir, pack) = packed(&sample_files());
    let original = fs::read(&pack).unwrap();
    let target = dir.path().join("bad.pac");

    // Altered signature
    let mut bytes = original.clone();
    bytes[0] = b'X';
    fs::write(&target, &bytes).unwrap();
    let err = PackReader::open(&target, &PackOpenOptions::default()).unwrap_err();
    assert!(matches!(err, PackError::InvalidSignature { .. }));
    assert!(err.is_format_error());

    // Payload region before name table
    let mut bytes = original.clone();
    let name_table = i64::from_le_bytes(bytes[16..24].try_into().unwrap());
    bytes[24..32].copy_from_slice(&(name_table - 2).to_le_bytes());
    fs::write(&target, &bytes).unwrap();
    let err = PackReader::open(&target, &PackOpenOptions::default()).unwrap_err();
    assert!(matches!(err, PackError::InconsistentOffsets(_)));
    assert!(err.is_format_error());

    // Negative entry count
    let mut bytes = original.clone();
    bytes[8..16].copy_from_slice(&(-1i64).to_le_bytes());
    fs::write(&target, &bytes).unwrap();
    assert!(matches!(
        PackReader::open(&target, &PackOpenOptions::default()),
        Err(PackError::InvalidHeaderField { field: "entry_count", .. })
    ));

    // Entry count far beyond the file
    let mut bytes = original.clone();
    bytes[8..16].copy_from_slice(&(1i64 << 40).to_le_bytes());
    fs::write(&target, &bytes).unwrap();
    assert!(PackReader::open(&target, &PackOpenOptions::default()).is_err());

    // Truncated file
    fs::write(&target, &original[..20]).unwrap();
    assert!(matches!(
        PackReader::open(&target, &PackOpenOptions::default()),
        Err(PackError::Truncated { .. })
    ));

    // Payload region extending past the footer
    fs::write(&target, &original[..original.len() - 10]).unwrap();
    let err = PackReader::open(&target, &PackOpenOptions::default()).unwrap_err();
    assert!(err.is_format_error(), "unexpected error {err:?}");
}

#[test]
fn malformed_records_are_rejected() {
    let (dir, pack) = packed(&sample_files());
    let original = fs::read(&pack).unwrap();
    let target = dir.path().join("bad-record.pac");
    let record = |index: u64| (HEADER_SIZE + index * RECORD_SIZE) as usize;

    // Unknown kind
    let mut bytes = original.clone();
    bytes[record(1)..record(1) + 4].copy_from_slice(&9i32.to_le_bytes());
    fs::write(&target, &bytes).unwrap();
    let err = PackReader::open(&target, &PackOpenOptions::default()).unwrap_err();
    assert!(err.is_format_error());

    // Root child range running off the table
    let mut bytes = original.clone();
    bytes[record(0) + 16..record(0) + 20].copy_from_slice(&10_000i32.to_le_bytes());
    fs::write(&target, &bytes).unwrap();
    assert!(matches!(
        PackReader::open(&target, &PackOpenOptions::default()),
        Err(PackError::InvalidRecord { index: 0, .. })
    ));

    // Name range outside the name table
    let mut bytes = original;
    bytes[record(1) + 12..record(1) + 16].copy_from_slice(&i32::MAX.to_le_bytes());
    fs::write(&target, &bytes).unwrap();
    assert!(matches!(
        PackReader::open(&target, &PackOpenOptions::default()),
        Err(PackError::InvalidRecord { index: 1, .. })
    ));
}

#[test]
fn missing_pack_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PackReader::open(dir.path().join("nope.pac"), &PackOpenOptions::default())
        .unwrap_err();
    assert!(matches!(err, PackError::Io(_)));
    assert!(!err.is_format_error());
}

fn file_map() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let segment = "[a-e]{1,3}";
    let path = proptest::collection::vec(segment, 1..4).prop_map(|parts| parts.join("/"));
    proptest::collection::btree_map(path, proptest::collection::vec(any::<u8>(), 0..64), 0..12)
        .prop_filter("no file may also be a directory", |files| {
            files.keys().all(|path| {
                let prefix = format!("{path}/");
                !files.keys().any(|other| other.starts_with(&prefix))
            })
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_trees_round_trip(files in file_map()) {
        let (_dir, pack) = packed(&files);
        let reader = PackReader::open(&pack, &PackOpenOptions::default().with_verify_checksum(true))
            .unwrap();

        let listed: BTreeMap<String, Vec<u8>> = reader
            .file_paths()
            .into_iter()
            .map(|(path, index)| (path, reader.read_entry(index).unwrap()))
            .collect();
        prop_assert_eq!(listed, files);
    }
}
