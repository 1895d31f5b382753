//! Deterministic, content-addressed `tar+gzip` archives.
//!
//! Build an archive from named payloads or filesystem trees, with a SHA-256
//! digest per entry and one over the whole uncompressed tar stream.
//!
//! ```no_run
//! use tarseal_core::{ArchiveEntry, Packer};
//! use chrono::Utc;
//!
//! let result = Packer::new(Utc::now())
//!     .pack(&[ArchiveEntry::new("example.txt", "hello world")])
//!     .unwrap();
//! println!("{} {}", result.aggregate_digest, result.entries[0].name);
//! ```

pub mod archive;
pub mod config;
pub mod digest;
pub mod errors;
pub mod fingerprint;
pub mod inspect;
pub mod pack;
pub mod resource;
pub mod walk;

// Convenience re-exports
pub use archive::{ArchiveHeader, ArchiveWriter, EntryKind, Sealed, MIMETYPE};
pub use config::{PackConfig, PackConfigOverrides, DEFAULT_MODE};
pub use digest::{Digest, DigestEngine, DigestTap, FanOut, TeeReader};
pub use errors::{ArchiveError, ErrorKind, Result, SizeMismatch};
pub use fingerprint::{compute_or_reuse_digest, fingerprint, fingerprint_base64, DigestDecision};
pub use inspect::{inspect, inspect_seekable, summarize, EntrySummary, Inspection};
pub use pack::{ArchiveEntry, ArchiveResult, Content, PackedEntry, Packed, Packer};
pub use resource::{plan, ArchiveResource, ArchiveState, Plan, SourceSpec, SourceState};
