use crate::config::PackConfig;
use crate::digest::{Digest, DigestTap};
use crate::errors::{ArchiveError, Result, SizeMismatch};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tar::{Builder, HeaderMode};

use super::header::ArchiveHeader;

type TarStack<W> = Builder<DigestTap<GzEncoder<Gate<W>>>>;

/// Streaming `gzip(tar)` writer over a caller-supplied sink.
///
/// The tar layer sits on a [`DigestTap`], so the aggregate digest covers the
/// exact uncompressed tar stream: headers, content, padding and the
/// end-of-archive marker.
///
/// Layers are closed inner to outer by [`close`](Self::close): tar first, then
/// gzip. Outer encodings (base64, files) belong to the sink and are closed by
/// the caller after [`finish`](Self::finish) hands the sink back.
///
/// A failed `write_entry` poisons the writer and cuts the sink off, so the
/// end-of-archive marker and gzip trailer are never written for a failed
/// build. Dropping an unfinished writer does the same.
pub struct ArchiveWriter<W: Write> {
    tar: Option<TarStack<W>>,
    live: Arc<AtomicBool>,
    sealed: Option<Sealed<W>>,
    poisoned: bool,
    entries: usize,
}

/// A closed archive: the sink with the finished gzip stream and the aggregate
/// digest of the uncompressed tar stream.
#[derive(Debug)]
pub struct Sealed<W> {
    pub sink: W,
    pub digest: Digest,
    pub tar_bytes: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn open(sink: W, config: &PackConfig) -> Self {
        // Fixed gzip mtime and OS byte keep the container reproducible.
        let live = Arc::new(AtomicBool::new(true));
        let gate = Gate {
            inner: sink,
            live: Arc::clone(&live),
        };
        let encoder = GzBuilder::new()
            .mtime(0)
            .operating_system(255)
            .write(gate, Compression::new(config.compression_level));

        let mut tar = Builder::new(DigestTap::new(encoder));
        tar.mode(HeaderMode::Deterministic);

        Self {
            tar: Some(tar),
            live,
            sealed: None,
            poisoned: false,
            entries: 0,
        }
    }

    /// Write one header followed by exactly `header.size` bytes from `content`.
    pub fn write_entry<R: Read>(&mut self, header: &ArchiveHeader, content: R) -> Result<()> {
        if self.poisoned {
            return Err(ArchiveError::format(
                "archive writer is unusable after an earlier failure",
            ));
        }
        let tar = self
            .tar
            .as_mut()
            .ok_or_else(|| ArchiveError::format("archive writer is already closed"))?;

        let res = append(tar, header, content);
        match res {
            Ok(()) => self.entries += 1,
            Err(_) => {
                self.poisoned = true;
                self.cut_off();
            }
        }
        res
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Close the tar layer, then the gzip layer.
    ///
    /// Safe to call more than once and after a failure: later calls return
    /// `Ok(())`, and a poisoned writer only releases its layers so the error
    /// already returned stays the authoritative one.
    pub fn close(&mut self) -> Result<()> {
        let Some(tar) = self.tar.take() else {
            return Ok(());
        };
        if self.poisoned {
            tracing::debug!(entries = self.entries, "releasing poisoned archive writer");
            drop(tar);
            return Ok(());
        }
        self.poisoned = true;

        let tap = tar
            .into_inner()
            .map_err(|e| ArchiveError::from(e).with_context("closing tar layer"))?;
        let tar_bytes = tap.bytes_written();
        let (encoder, digest) = tap.finish();
        let sink = encoder
            .finish()
            .map_err(|e| ArchiveError::from(e).with_context("closing gzip layer"))?
            .inner;

        tracing::debug!(entries = self.entries, tar_bytes, %digest, "archive sealed");
        self.poisoned = false;
        self.sealed = Some(Sealed {
            sink,
            digest,
            tar_bytes,
        });
        Ok(())
    }

    /// Close the writer and return the sink with the aggregate digest.
    pub fn finish(mut self) -> Result<Sealed<W>> {
        self.close()?;
        self.sealed
            .take()
            .ok_or_else(|| ArchiveError::format("archive was not sealed after an earlier failure"))
    }

    /// Stop forwarding bytes to the sink. Layers released afterwards write
    /// nothing.
    fn cut_off(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl<W: Write> Drop for ArchiveWriter<W> {
    fn drop(&mut self) {
        if self.tar.is_some() {
            tracing::debug!(entries = self.entries, "dropping unfinished archive writer");
            self.cut_off();
        }
    }
}

/// Sink wrapper between gzip and the caller. Once cut off, writes fail and
/// nothing reaches `inner`.
struct Gate<W> {
    inner: W,
    live: Arc<AtomicBool>,
}

impl<W: Write> Gate<W> {
    fn check(&self) -> io::Result<()> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(io::Error::other("archive writer aborted"))
        }
    }
}

impl<W: Write> Write for Gate<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        self.inner.flush()
    }
}

fn append<T: Write, R: Read>(
    tar: &mut Builder<T>,
    header: &ArchiveHeader,
    content: R,
) -> Result<()> {
    let mut raw = header.to_tar()?;
    let reader = ExactReader::new(content, header.size);
    tar.append_data(&mut raw, &header.name, reader)
        .map_err(|e| ArchiveError::from(e).with_context(format!("writing entry {}", header.name)))
}

/// Yields exactly `declared` bytes from `inner` or fails with [`SizeMismatch`].
///
/// A short source fails at its EOF; a long source fails when the first byte
/// past `declared` is seen.
struct ExactReader<R> {
    inner: R,
    declared: u64,
    read: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, declared: u64) -> Self {
        Self {
            inner,
            declared,
            read: 0,
        }
    }

    fn probe_overrun(&mut self) -> io::Result<()> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    return Err(SizeMismatch {
                        declared: self.declared,
                        actual: self.declared + 1,
                    }
                    .into())
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let remaining = self.declared - self.read;
        if remaining == 0 {
            self.probe_overrun()?;
            return Ok(0);
        }

        let max = remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(SizeMismatch {
                declared: self.declared,
                actual: self.read,
            }
            .into());
        }
        self.read += n as u64;
        Ok(n)
    }
}
