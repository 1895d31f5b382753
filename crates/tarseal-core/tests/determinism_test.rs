//! Determinism and ordering tests for packed archives.
//!
//! Same ordered input and same timestamp must give byte-identical archives;
//! reordering must change the aggregate digest.

use chrono::{DateTime, TimeZone, Utc};
use std::io::Cursor;
use tarseal_core::{summarize, ArchiveEntry, Digest, EntryKind, Packer};

fn fixed_time() -> DateTime<Utc> {
    // 2023-11-14T22:13:20Z
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn entries() -> Vec<ArchiveEntry> {
    vec![
        ArchiveEntry::new("example.txt", "hello world"),
        ArchiveEntry::new("config/app.json", r#"{"debug":false}"#).with_mode(0o644),
        ArchiveEntry::base64("foo.bar", "d2hhdCdzIHVw"),
    ]
}

// ============================================================================
// Byte-for-Byte Determinism
// ============================================================================

#[test]
fn test_same_input_same_bytes() {
    let a = Packer::new(fixed_time()).pack(&entries()).unwrap();
    let b = Packer::new(fixed_time()).pack(&entries()).unwrap();

    assert_eq!(a.payload, b.payload, "archives must be byte-identical");
    assert_eq!(a.aggregate_digest, b.aggregate_digest);
    assert_eq!(a.content_digest, b.content_digest);
    assert_eq!(a.entries, b.entries);
}

#[test]
fn test_timestamp_changes_archive() {
    let a = Packer::new(fixed_time()).pack(&entries()).unwrap();
    let b = Packer::new(Utc.timestamp_opt(1_700_000_001, 0).unwrap())
        .pack(&entries())
        .unwrap();

    assert_ne!(a.aggregate_digest, b.aggregate_digest);
    // Content did not change, only headers.
    assert_eq!(a.content_digest, b.content_digest);
    for (x, y) in a.entries.iter().zip(&b.entries) {
        assert_eq!(x.digest, y.digest);
    }
}

// ============================================================================
// Order Sensitivity
// ============================================================================

#[test]
fn test_order_changes_aggregate_only() {
    let forward = entries();
    let mut reversed = entries();
    reversed.reverse();

    let a = Packer::new(fixed_time()).pack(&forward).unwrap();
    let b = Packer::new(fixed_time()).pack(&reversed).unwrap();

    assert_ne!(a.aggregate_digest, b.aggregate_digest);
    assert_ne!(a.payload, b.payload);

    let mut da: Vec<_> = a.entries.iter().map(|e| (e.name.clone(), e.digest)).collect();
    let mut db: Vec<_> = b.entries.iter().map(|e| (e.name.clone(), e.digest)).collect();
    da.sort();
    db.sort();
    assert_eq!(da, db, "per-entry digests are order independent");
}

#[test]
fn test_identical_contents_swapped_names_still_differ() {
    let a = Packer::new(fixed_time())
        .pack(&[ArchiveEntry::new("a", "same"), ArchiveEntry::new("b", "same")])
        .unwrap();
    let b = Packer::new(fixed_time())
        .pack(&[ArchiveEntry::new("b", "same"), ArchiveEntry::new("a", "same")])
        .unwrap();

    assert_eq!(a.content_digest, b.content_digest);
    assert_ne!(a.aggregate_digest, b.aggregate_digest);
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_pack_then_inspect_preserves_names_sizes_order() {
    let input = entries();
    let result = Packer::new(fixed_time()).pack(&input).unwrap();
    let summaries = summarize(Cursor::new(&result.payload)).unwrap();

    assert_eq!(summaries.len(), input.len());
    for (summary, entry) in summaries.iter().zip(&input) {
        let raw = entry.content.decode().unwrap();
        assert_eq!(summary.name, entry.name);
        assert_eq!(summary.size, raw.len() as u64);
        assert_eq!(summary.kind, EntryKind::File);
    }
    assert_eq!(summaries[1].mode, 0o644);
    assert_eq!(summaries[0].mode, 0o600);
}

#[test]
fn test_what_s_up_digest_is_raw_sha256() {
    let result = Packer::new(fixed_time())
        .pack(&[ArchiveEntry::base64("foo.bar", "d2hhdCdzIHVw")])
        .unwrap();
    assert_eq!(result.entries[0].size, 9);
    assert_eq!(result.entries[0].digest, Some(Digest::of(b"what's up")));
}

#[test]
fn test_empty_archive_has_defined_digest() {
    let a = Packer::new(fixed_time()).pack(&[]).unwrap();
    let b = Packer::new(Utc.timestamp_opt(0, 0).unwrap()).pack(&[]).unwrap();

    assert!(summarize(Cursor::new(&a.payload)).unwrap().is_empty());
    // No headers means no timestamp in the stream.
    assert_eq!(a.aggregate_digest, b.aggregate_digest);
    assert_eq!(a.payload, b.payload);
}

#[test]
fn test_gzip_container_is_recognizable() {
    let result = Packer::new(fixed_time()).pack(&entries()).unwrap();
    assert_eq!(&result.payload[..2], &[0x1f, 0x8b]);
    assert_eq!(result.mimetype, tarseal_core::MIMETYPE);
}
