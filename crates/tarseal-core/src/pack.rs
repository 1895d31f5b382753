//! Entry packer: named payloads in, sealed archive plus digests out.
//!
//! Entries are written strictly in caller order. Each entry's content is
//! tee'd into its own [`DigestEngine`] and into the batch content engine while
//! the archive writer's tap hashes the whole tar stream.

use crate::archive::{ArchiveHeader, ArchiveWriter, EntryKind, MIMETYPE};
use crate::config::PackConfig;
use crate::digest::{Digest, DigestEngine, FanOut, TeeReader};
use crate::errors::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Entry payload, either raw or in base64 transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Raw(Vec<u8>),
    Base64(String),
}

impl Content {
    /// Raw bytes of the payload. Malformed base64 is a `Decode` error.
    pub fn decode(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Self::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::Base64(text) => Ok(Cow::Owned(STANDARD.decode(text)?)),
        }
    }
}

/// One logical file to place in an archive.
///
/// Names are not checked for uniqueness; two entries with the same name are
/// both written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub content: Content,
    pub mode: Option<u32>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: Content::Raw(content.into()),
            mode: None,
        }
    }

    pub fn base64(name: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Content::Base64(encoded.into()),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// What was written for one entry. `digest` is the SHA-256 of the raw
/// content; directories and links have none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedEntry {
    pub name: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

/// A finished build written into a caller-owned sink.
#[derive(Debug)]
pub struct Packed<W> {
    pub sink: W,
    pub entries: Vec<PackedEntry>,
    /// SHA-256 of the uncompressed tar stream.
    pub aggregate_digest: Digest,
    /// SHA-256 of all entry contents concatenated in write order.
    pub content_digest: Digest,
    pub timestamp: DateTime<Utc>,
}

/// A finished in-memory build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveResult {
    pub entries: Vec<PackedEntry>,
    pub aggregate_digest: Digest,
    pub content_digest: Digest,
    pub timestamp: DateTime<Utc>,
    pub mimetype: &'static str,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl ArchiveResult {
    /// Finished archive in base64 transport form.
    pub fn payload_base64(&self) -> String {
        STANDARD.encode(&self.payload)
    }
}

impl From<Packed<Vec<u8>>> for ArchiveResult {
    fn from(packed: Packed<Vec<u8>>) -> Self {
        Self {
            entries: packed.entries,
            aggregate_digest: packed.aggregate_digest,
            content_digest: packed.content_digest,
            timestamp: packed.timestamp,
            mimetype: MIMETYPE,
            payload: packed.sink,
        }
    }
}

/// Builds archives whose entries all share one timestamp.
///
/// Reusing a `Packer` (same timestamp, same config) on the same ordered input
/// reproduces the archive byte-for-byte.
#[derive(Debug, Clone)]
pub struct Packer {
    config: PackConfig,
    timestamp: DateTime<Utc>,
    excluded: Vec<PathBuf>,
}

impl Packer {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            config: PackConfig::default(),
            timestamp,
            excluded: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: PackConfig) -> Self {
        self.config = config;
        self
    }

    /// Leave `path` (and anything under it) out of filesystem walks. Used to
    /// keep an output file that lives inside a packed root out of its own
    /// archive.
    pub fn exclude(mut self, path: impl AsRef<Path>) -> Self {
        self.excluded.push(path.as_ref().to_path_buf());
        self
    }

    pub fn excluded(&self) -> &[PathBuf] {
        &self.excluded
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Pack entries into memory.
    pub fn pack(&self, entries: &[ArchiveEntry]) -> Result<ArchiveResult> {
        self.pack_into(Vec::new(), entries).map(ArchiveResult::from)
    }

    /// Pack entries into `sink`, returning it once every layer is closed.
    ///
    /// The first failure aborts the build; nothing partial is returned.
    pub fn pack_into<W: Write>(&self, sink: W, entries: &[ArchiveEntry]) -> Result<Packed<W>> {
        let mut session = self.session(sink);
        for (i, entry) in entries.iter().enumerate() {
            let data = entry
                .content
                .decode()
                .map_err(|e| e.with_context(format!("entry #{i} ({})", entry.name)))?;
            let mode = entry.mode.unwrap_or(self.config.default_mode);
            let header =
                ArchiveHeader::file(entry.name.as_str(), data.len() as u64, mode, self.timestamp);
            session.write_content(&header, data.as_ref())?;
        }
        session.finish()
    }

    pub(crate) fn session<W: Write>(&self, sink: W) -> PackSession<W> {
        PackSession {
            writer: ArchiveWriter::open(sink, &self.config),
            content: DigestEngine::new(),
            entries: Vec::new(),
            timestamp: self.timestamp,
        }
    }
}

/// One build in progress.
pub(crate) struct PackSession<W: Write> {
    writer: ArchiveWriter<W>,
    content: DigestEngine,
    entries: Vec<PackedEntry>,
    timestamp: DateTime<Utc>,
}

impl<W: Write> PackSession<W> {
    /// Write a header plus content, returning the content digest.
    pub(crate) fn write_content<R: Read>(
        &mut self,
        header: &ArchiveHeader,
        content: R,
    ) -> Result<Digest> {
        let mut entry = DigestEngine::new();
        {
            let fan = FanOut::new(vec![&mut entry as &mut dyn Write, &mut self.content]);
            self.writer
                .write_entry(header, TeeReader::new(content, fan))?;
        }
        let digest = entry.sum();
        tracing::debug!(name = %header.name, size = header.size, %digest, "packed entry");
        self.record(header, Some(digest));
        Ok(digest)
    }

    /// Write a header that carries no content (directories, links).
    pub(crate) fn write_header(&mut self, header: &ArchiveHeader) -> Result<()> {
        self.writer.write_entry(header, io::empty())?;
        tracing::debug!(name = %header.name, kind = %header.kind, "packed entry");
        self.record(header, None);
        Ok(())
    }

    fn record(&mut self, header: &ArchiveHeader, digest: Option<Digest>) {
        self.entries.push(PackedEntry {
            name: header.name.clone(),
            kind: header.kind,
            mode: header.mode,
            size: header.size,
            digest,
        });
    }

    pub(crate) fn finish(self) -> Result<Packed<W>> {
        let sealed = self.writer.finish()?;
        let content_digest = self.content.sum();
        tracing::debug!(
            entries = self.entries.len(),
            aggregate = %sealed.digest,
            "build finished"
        );
        Ok(Packed {
            sink: sealed.sink,
            entries: self.entries,
            aggregate_digest: sealed.digest,
            content_digest,
            timestamp: self.timestamp,
        })
    }
}
