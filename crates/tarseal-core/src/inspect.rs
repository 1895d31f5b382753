//! Archive inspector: list the entries of an existing `gzip(tar)` stream
//! without materializing content.
//!
//! ```no_run
//! use tarseal_core::inspect::inspect_seekable;
//! use std::fs::File;
//!
//! let mut file = File::open("bundle.tar.gz").unwrap();
//! let mut inspection = inspect_seekable(&mut file).unwrap();
//! for entry in inspection.entries().unwrap() {
//!     let entry = entry.unwrap();
//!     println!("{} {} {}", entry.kind, entry.name, entry.size);
//! }
//! inspection.restore().unwrap();
//! ```

use crate::archive::EntryKind;
use crate::errors::{ArchiveError, Result};
use flate2::read::GzDecoder;
use serde::Serialize;
use std::io::{self, Read, Seek, SeekFrom};
use tar::EntryType;

/// What the inspector reports for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub mtime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

/// A single pass over an archive stream.
pub struct Inspection<R: Read> {
    archive: tar::Archive<GzDecoder<R>>,
}

/// Inspect `reader` from its current position.
pub fn inspect<R: Read>(reader: R) -> Inspection<R> {
    Inspection {
        archive: tar::Archive::new(GzDecoder::new(reader)),
    }
}

/// Inspect a seekable stream from its start.
///
/// The caller's position is put back when the inspection is restored or
/// dropped, so inspecting is position-preserving.
pub fn inspect_seekable<S: Read + Seek>(stream: &mut S) -> Result<Inspection<Rewind<'_, S>>> {
    let rewind = Rewind::new(stream)
        .map_err(|e| ArchiveError::from(e).with_context("unable to seek to start of archive"))?;
    Ok(inspect(rewind))
}

/// Collect every summary of the archive in `reader`.
pub fn summarize<R: Read>(reader: R) -> Result<Vec<EntrySummary>> {
    let mut inspection = inspect(reader);
    let entries = inspection.entries()?;
    entries.collect()
}

impl<R: Read> Inspection<R> {
    /// Lazy iterator over the entries. Can be taken once per inspection.
    pub fn entries(&mut self) -> Result<Entries<'_, R>> {
        let inner = self
            .archive
            .entries()
            .map_err(|e| ArchiveError::from_read_side(e).with_context("reading archive"))?;
        Ok(Entries { inner, done: false })
    }

    pub fn into_inner(self) -> R {
        self.archive.into_inner().into_inner()
    }
}

impl<S: Read + Seek> Inspection<Rewind<'_, S>> {
    /// Put the stream back where the caller left it.
    pub fn restore(self) -> Result<()> {
        self.into_inner().restore()
    }
}

/// Entry summaries in archive order.
///
/// The first decompression or header error is yielded once and ends the
/// iteration; the end-of-archive marker ends it cleanly.
pub struct Entries<'a, R: Read> {
    inner: tar::Entries<'a, GzDecoder<R>>,
    done: bool,
}

impl<'a, R: Read> Iterator for Entries<'a, R> {
    type Item = Result<EntrySummary>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let entry = match self.inner.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(
                        ArchiveError::from_read_side(e).with_context("reading archive")
                    ));
                }
                Some(Ok(entry)) => entry,
            };

            if is_metadata_record(entry.header().entry_type()) {
                continue;
            }

            let summary = summarize_entry(&entry);
            match &summary {
                Ok(s) => tracing::debug!(kind = %s.kind, name = %s.name, size = s.size, "entry"),
                Err(_) => self.done = true,
            }
            return Some(summary);
        }
    }
}

/// Extension and padding records that describe other entries.
fn is_metadata_record(entry_type: EntryType) -> bool {
    matches!(
        entry_type,
        EntryType::XGlobalHeader
            | EntryType::XHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink
    )
}

fn summarize_entry<R: Read>(entry: &tar::Entry<'_, R>) -> Result<EntrySummary> {
    let header = entry.header();
    let malformed = |e: io::Error| ArchiveError::from_read_side(e).with_context("entry header");

    let name = entry.path().map_err(malformed)?.to_string_lossy().into_owned();
    let link_target = entry
        .link_name()
        .map_err(malformed)?
        .map(|p| p.to_string_lossy().into_owned());

    Ok(EntrySummary {
        name,
        kind: EntryKind::from_tar(header.entry_type()),
        size: entry.size(),
        mode: header.mode().map_err(malformed)?,
        mtime: header.mtime().map_err(malformed)?,
        link_target,
    })
}

/// Seekable reader that starts at offset 0 and returns the stream to its
/// original position on [`restore`](Self::restore) or drop.
pub struct Rewind<'a, S: Read + Seek> {
    stream: &'a mut S,
    origin: u64,
    restored: bool,
}

impl<'a, S: Read + Seek> Rewind<'a, S> {
    fn new(stream: &'a mut S) -> io::Result<Self> {
        let origin = stream.stream_position()?;
        stream.seek(SeekFrom::Start(0))?;
        Ok(Self {
            stream,
            origin,
            restored: false,
        })
    }

    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.stream
            .seek(SeekFrom::Start(self.origin))
            .map(|_| ())
            .map_err(|e| ArchiveError::from(e).with_context("unable to restore stream position"))
    }
}

impl<S: Read + Seek> Read for Rewind<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<S: Read + Seek> Drop for Rewind<'_, S> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.stream.seek(SeekFrom::Start(self.origin)) {
            tracing::warn!(error = %e, origin = self.origin, "unable to restore stream position");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{ArchiveEntry, Packer};
    use chrono::{TimeZone, Utc};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn sample() -> Vec<u8> {
        Packer::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .pack(&[
                ArchiveEntry::new("a.txt", "alpha"),
                ArchiveEntry::new("dir/b.txt", "bravo!"),
            ])
            .unwrap()
            .payload
    }

    #[test]
    fn lists_entries_in_order() {
        let summaries = summarize(Cursor::new(sample())).unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "dir/b.txt"]);
        assert_eq!(summaries[1].size, 6);
        assert_eq!(summaries[0].mtime, 1_700_000_000);
    }

    #[test]
    fn seekable_inspection_restores_position() {
        let mut stream = Cursor::new(sample());
        stream.set_position(7);
        {
            let mut inspection = inspect_seekable(&mut stream).unwrap();
            assert_eq!(inspection.entries().unwrap().count(), 2);
        }
        assert_eq!(stream.position(), 7);

        let mut inspection = inspect_seekable(&mut stream).unwrap();
        let names: Vec<_> = inspection
            .entries()
            .unwrap()
            .map(|e| e.unwrap().name)
            .collect();
        assert_eq!(names.len(), 2);
        inspection.restore().unwrap();
        assert_eq!(stream.position(), 7);
    }

    #[test]
    fn garbage_is_format_error_and_stops() {
        let mut inspection = inspect(&b"this is not a gzip stream"[..]);
        let mut entries = inspection.entries().unwrap();
        let first = entries.next().unwrap();
        assert!(first.unwrap_err().is_format());
        assert!(entries.next().is_none());
    }

    #[test]
    fn corrupt_header_checksum_is_format_error() {
        let mut raw = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o600);
        raw.append_data(&mut header, "x.txt", &b"abc"[..]).unwrap();
        let mut tar_bytes = raw.into_inner().unwrap();
        tar_bytes[0] = b'y';

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&tar_bytes).unwrap();
        let payload = gz.finish().unwrap();

        let err = summarize(Cursor::new(payload)).unwrap_err();
        assert!(err.is_format(), "{err}");
    }

    #[test]
    fn long_names_reported_in_full() {
        let long = format!("{}/file.txt", "nested".repeat(30));
        let payload = Packer::new(Utc.timestamp_opt(0, 0).unwrap())
            .pack(&[ArchiveEntry::new(long.clone(), "x")])
            .unwrap()
            .payload;
        let summaries = summarize(Cursor::new(payload)).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, long);
    }
}
