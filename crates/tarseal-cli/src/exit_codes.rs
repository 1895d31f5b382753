//! Exit codes for the `tarseal` binary.
//! These codes are part of the public contract; scripts branch on them.

use tarseal_core::{ArchiveError, ErrorKind};

pub const SUCCESS: i32 = 0;
pub const INTERNAL_ERROR: i32 = 1; // Anything not classified below
pub const DECODE_ERROR: i32 = 2; // Malformed base64/hex/JSON input
pub const IO_ERROR: i32 = 3; // Filesystem or sink failure
pub const FORMAT_ERROR: i32 = 4; // Corrupt archive or size mismatch

/// Pick the exit code for a failed command from the first `ArchiveError` in
/// its chain.
pub fn for_error(err: &anyhow::Error) -> i32 {
    let archive = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ArchiveError>());
    match archive.map(ArchiveError::kind) {
        Some(ErrorKind::Decode) => DECODE_ERROR,
        Some(ErrorKind::Io) => IO_ERROR,
        Some(ErrorKind::Format) | Some(ErrorKind::TruncatedWrite) => FORMAT_ERROR,
        None => INTERNAL_ERROR,
    }
}
