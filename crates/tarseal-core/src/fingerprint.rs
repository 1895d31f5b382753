//! Change detection over payload digests.
//!
//! The resource layer compares the fingerprint of newly supplied content with
//! the one it stored; any difference means a full rebuild.

use crate::digest::Digest;
use crate::errors::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// SHA-256 of raw content. Pure and deterministic.
pub fn fingerprint(content: &[u8]) -> Digest {
    Digest::of(content)
}

/// Fingerprint of base64 transport content, taken over the decoded bytes.
///
/// Malformed input is a `Decode` error; it is never hashed as empty content.
pub fn fingerprint_base64(encoded: &str) -> Result<Digest> {
    let raw = STANDARD.decode(encoded)?;
    Ok(fingerprint(&raw))
}

/// Outcome of comparing new content against a stored digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestDecision {
    pub digest: Digest,
    /// True when there was no prior digest or it differs.
    pub changed: bool,
}

/// Fingerprint `encoded` and compare it with `prior`.
pub fn compute_or_reuse_digest(prior: Option<&Digest>, encoded: &str) -> Result<DigestDecision> {
    let digest = fingerprint_base64(encoded)?;
    let changed = prior != Some(&digest);
    Ok(DigestDecision { digest, changed })
}
