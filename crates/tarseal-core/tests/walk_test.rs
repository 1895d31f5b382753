//! Filesystem walker tests.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{TimeZone, Utc};
use std::io::Cursor;
use tarseal_core::{summarize, Digest, EntryKind, Packer};

fn packer() -> Packer {
    Packer::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
}

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("b.txt").write_str("bravo").unwrap();
    temp.child("a.txt").write_str("alpha").unwrap();
    temp.child("sub").create_dir_all().unwrap();
    temp.child("sub/c.txt").write_str("charlie!").unwrap();
    temp
}

#[test]
fn test_walk_names_relative_in_lexical_order() {
    let temp = fixture();
    let result = packer().pack_paths(&[temp.path()]).unwrap();

    let names: Vec<_> = result.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a.txt", "b.txt", "sub", "sub/c.txt"]);

    let sub = &result.entries[2];
    assert_eq!(sub.kind, EntryKind::Directory);
    assert_eq!(sub.size, 0);
    assert!(sub.digest.is_none());

    let c = &result.entries[3];
    assert_eq!(c.size, 8);
    assert_eq!(c.digest, Some(Digest::of(b"charlie!")));
}

#[test]
fn test_walk_round_trips_through_inspector() {
    let temp = fixture();
    let result = packer().pack_paths(&[temp.path()]).unwrap();
    let summaries = summarize(Cursor::new(&result.payload)).unwrap();

    assert_eq!(summaries.len(), result.entries.len());
    for (summary, entry) in summaries.iter().zip(&result.entries) {
        assert_eq!(summary.name, entry.name);
        assert_eq!(summary.size, entry.size);
        assert_eq!(summary.kind, entry.kind);
    }
}

#[test]
fn test_root_file_uses_base_name() {
    let temp = fixture();
    let file = temp.child("a.txt");
    let result = packer().pack_paths(&[file.path()]).unwrap();

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].name, "a.txt");
    assert_eq!(result.entries[0].digest, Some(Digest::of(b"alpha")));
}

#[test]
fn test_multiple_roots_in_caller_order() {
    let first = fixture();
    let second = TempDir::new().unwrap();
    second.child("z.txt").write_str("zulu").unwrap();

    let result = packer()
        .pack_paths(&[second.path(), first.child("sub").path()])
        .unwrap();
    let names: Vec<_> = result.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["z.txt", "c.txt"]);
}

#[test]
fn test_walk_is_deterministic() {
    let temp = fixture();
    let a = packer().pack_paths(&[temp.path()]).unwrap();
    let b = packer().pack_paths(&[temp.path()]).unwrap();
    assert_eq!(a.payload, b.payload);
    assert_eq!(a.aggregate_digest, b.aggregate_digest);
}

#[test]
fn test_missing_root_aborts_with_io() {
    let temp = fixture();
    let missing = temp.child("nope");
    let err = packer()
        .pack_paths(&[temp.path(), missing.path()])
        .unwrap_err();
    assert!(err.is_io(), "{err}");
}

#[test]
fn test_empty_directory_root_gives_empty_archive() {
    let temp = TempDir::new().unwrap();
    let result = packer().pack_paths(&[temp.path()]).unwrap();
    assert!(result.entries.is_empty());
    assert!(summarize(Cursor::new(&result.payload)).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn test_modes_and_symlinks_preserved() {
    use std::os::unix::fs::{symlink, PermissionsExt};

    let temp = fixture();
    let script = temp.child("run.sh");
    script.write_str("#!/bin/sh\n").unwrap();
    std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o750)).unwrap();
    symlink("a.txt", temp.child("link").path()).unwrap();

    let result = packer().pack_paths(&[temp.path()]).unwrap();
    let run = result.entries.iter().find(|e| e.name == "run.sh").unwrap();
    assert_eq!(run.mode, 0o750);

    let link = result.entries.iter().find(|e| e.name == "link").unwrap();
    assert_eq!(link.kind, EntryKind::Symlink);
    assert!(link.digest.is_none());

    let summaries = summarize(Cursor::new(&result.payload)).unwrap();
    let link = summaries.iter().find(|s| s.name == "link").unwrap();
    assert_eq!(link.link_target.as_deref(), Some("a.txt"));
}

#[test]
fn test_excluded_paths_are_skipped() {
    let temp = fixture();
    let result = packer()
        .exclude(temp.child("b.txt").path())
        .exclude(temp.child("sub").path())
        .pack_paths(&[temp.path()])
        .unwrap();

    let names: Vec<_> = result.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a.txt"]);
}

#[test]
fn test_exclusion_matches_relative_spelling() {
    let temp = fixture();
    let relative = temp.path().join("sub/../b.txt");
    let result = packer()
        .exclude(&relative)
        .pack_paths(&[temp.path()])
        .unwrap();
    assert!(result.entries.iter().all(|e| e.name != "b.txt"));
}

// procfs reports size 0 at stat time but yields content on read.
#[cfg(target_os = "linux")]
#[test]
fn test_size_change_between_stat_and_read_aborts_build() {
    let mut sink = Vec::new();
    let err = packer()
        .pack_paths_into(&mut sink, &["/proc/self/status"])
        .unwrap_err();
    assert!(err.is_truncated_write(), "{err}");

    match summarize(Cursor::new(&sink)) {
        Ok(entries) => assert!(entries.is_empty(), "{entries:?}"),
        Err(e) => assert!(e.is_format(), "{e}"),
    }
}
