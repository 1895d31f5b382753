//! Typed errors for archive builds.
//!
//! Every failure carries an [`ErrorKind`] discriminant plus the wrapped cause.
//! Callers branch on the kind with the `is_*` helpers instead of probing the
//! cause type.

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed encoded input (base64 content, hex digest).
    Decode,
    /// Read/write/stat failure against a sink or the filesystem.
    Io,
    /// Malformed archive on read-back, or misuse of a poisoned writer.
    Format,
    /// Content byte count differs from the size declared in its header.
    TruncatedWrite,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decode => "DecodeError",
            Self::Io => "IOError",
            Self::Format => "FormatError",
            Self::TruncatedWrite => "TruncatedWriteError",
        };
        f.write_str(name)
    }
}

/// Typed archive error with a stable kind.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ArchiveError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl ArchiveError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, message)
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.message = format!("{}: {}", context.into(), self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_decode(&self) -> bool {
        self.kind == ErrorKind::Decode
    }

    pub fn is_io(&self) -> bool {
        self.kind == ErrorKind::Io
    }

    pub fn is_format(&self) -> bool {
        self.kind == ErrorKind::Format
    }

    pub fn is_truncated_write(&self) -> bool {
        self.kind == ErrorKind::TruncatedWrite
    }

    /// Reclassify an I/O failure raised while reading an archive back.
    ///
    /// Gzip and tar parse failures arrive as `std::io::Error`; anything that is
    /// not a plain device/permission problem is treated as a malformed stream.
    pub(crate) fn from_read_side(err: std::io::Error) -> Self {
        use std::io::ErrorKind as K;
        let malformed = matches!(
            err.kind(),
            K::InvalidInput | K::InvalidData | K::UnexpectedEof | K::Other
        );
        let mut e = Self::from(err);
        if malformed && e.kind == ErrorKind::Io {
            e.kind = ErrorKind::Format;
        }
        e
    }
}

/// Marker carried inside an `std::io::Error` when a content source yields a
/// different number of bytes than its header declared.
///
/// On overrun `actual` is a lower bound: reading stops at the first extra byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("declared {declared} bytes, source produced {actual}")]
pub struct SizeMismatch {
    pub declared: u64,
    pub actual: u64,
}

impl From<SizeMismatch> for std::io::Error {
    fn from(m: SizeMismatch) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, m)
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        let mismatch = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<SizeMismatch>())
            .copied();
        let kind = if mismatch.is_some() {
            ErrorKind::TruncatedWrite
        } else {
            ErrorKind::Io
        };
        Self {
            kind,
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

impl From<base64::DecodeError> for ArchiveError {
    fn from(err: base64::DecodeError) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: format!("invalid base64: {err}"),
            source: Some(err.into()),
        }
    }
}

impl From<hex::FromHexError> for ArchiveError {
    fn from(err: hex::FromHexError) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: format!("invalid hex digest: {err}"),
            source: Some(err.into()),
        }
    }
}

impl From<walkdir::Error> for ArchiveError {
    fn from(err: walkdir::Error) -> Self {
        let message = match err.path() {
            Some(path) => format!("walk {}: {err}", path.display()),
            None => err.to_string(),
        };
        Self {
            kind: ErrorKind::Io,
            message,
            source: Some(err.into()),
        }
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        let kind = if err.is_io() {
            ErrorKind::Io
        } else {
            ErrorKind::Decode
        };
        Self {
            kind,
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}
