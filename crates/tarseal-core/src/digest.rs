//! Streaming SHA-256 digests.
//!
//! [`DigestEngine`] hashes whatever is written to it. [`DigestTap`] and
//! [`TeeReader`] hash bytes while passing them through unmodified, and
//! [`FanOut`] duplicates one write into several destinations.

use crate::errors::{ArchiveError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::io::{self, Read, Write};
use std::str::FromStr;

/// A 32-byte SHA-256 digest. Transported as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; Digest::LEN]);

impl Digest {
    pub const LEN: usize = 32;

    /// Hash a complete byte slice.
    pub fn of(data: &[u8]) -> Self {
        let mut engine = DigestEngine::new();
        engine.update(data);
        engine.sum()
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex transport form. Uppercase input is accepted.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut out = [0u8; Self::LEN];
        hex::decode_to_slice(s.trim(), &mut out)?;
        Ok(Self(out))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 over a byte stream.
#[derive(Clone, Default)]
pub struct DigestEngine {
    hasher: Sha256,
    written: u64,
}

impl DigestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.written += data.len() as u64;
    }

    /// Digest of everything written so far. Does not reset the engine.
    pub fn sum(&self) -> Digest {
        let out = self.hasher.clone().finalize();
        let mut bytes = [0u8; Digest::LEN];
        bytes.copy_from_slice(&out);
        Digest(bytes)
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Write for DigestEngine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that forwards to `inner` and hashes exactly the bytes `inner` accepted.
pub struct DigestTap<W> {
    inner: W,
    engine: DigestEngine,
}

impl<W: Write> DigestTap<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            engine: DigestEngine::new(),
        }
    }

    pub fn sum(&self) -> Digest {
        self.engine.sum()
    }

    pub fn bytes_written(&self) -> u64 {
        self.engine.bytes_written()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Detach the tap, returning the inner writer and the final digest.
    pub fn finish(self) -> (W, Digest) {
        let digest = self.engine.sum();
        (self.inner, digest)
    }
}

impl<W: Write> Write for DigestTap<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.engine.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Duplicates every write into all destinations, in order.
///
/// Each destination receives the full buffer; the first failure aborts the write.
pub struct FanOut<'a> {
    sinks: Vec<&'a mut dyn Write>,
}

impl<'a> FanOut<'a> {
    pub fn new(sinks: Vec<&'a mut dyn Write>) -> Self {
        Self { sinks }
    }
}

impl Write for FanOut<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in self.sinks.iter_mut() {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in self.sinks.iter_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Reader that copies every byte it yields into `tap`.
pub struct TeeReader<R, W> {
    inner: R,
    tap: W,
}

impl<R: Read, W: Write> TeeReader<R, W> {
    pub fn new(inner: R, tap: W) -> Self {
        Self { inner, tap }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.inner, self.tap)
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.tap.write_all(&buf[..n])?;
        }
        Ok(n)
    }
}
