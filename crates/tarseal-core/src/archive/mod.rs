//! Archive container: `gzip(tar)` with GNU headers.
//!
//! - [`header`]: entry declarations (`ArchiveHeader`, `EntryKind`)
//! - [`writer`]: layered streaming writer (`ArchiveWriter`)

pub mod header;
pub mod writer;

pub use header::{ArchiveHeader, EntryKind};
pub use writer::{ArchiveWriter, Sealed};

/// MIME type of every archive this crate produces.
pub const MIMETYPE: &str = "application/tar+gzip";
