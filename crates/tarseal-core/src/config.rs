//! Build configuration.

use crate::errors::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Permission bits for entries that do not specify one: read/write, owner only.
pub const DEFAULT_MODE: u32 = 0o600;

/// Settings shared by every build of one [`Packer`](crate::pack::Packer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackConfig {
    /// gzip level, 0 (store) to 9 (best).
    pub compression_level: u32,
    /// Mode applied to explicit entries without one.
    pub default_mode: u32,
    /// Follow symlinks while walking instead of archiving them as links.
    pub follow_links: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            default_mode: DEFAULT_MODE,
            follow_links: false,
        }
    }
}

/// Partial overrides for `PackConfig`. Used for CLI/config JSON parsing.
/// Unknown keys cause deserialization to fail (deny_unknown_fields).
/// Merge with `PackConfig::default().apply(overrides)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackConfigOverrides {
    pub compression_level: Option<u32>,
    pub default_mode: Option<u32>,
    pub follow_links: Option<bool>,
}

impl PackConfig {
    /// Apply overrides onto these settings. Only `Some` values override.
    pub fn apply(self, overrides: PackConfigOverrides) -> Self {
        Self {
            compression_level: overrides
                .compression_level
                .unwrap_or(self.compression_level),
            default_mode: overrides.default_mode.unwrap_or(self.default_mode),
            follow_links: overrides.follow_links.unwrap_or(self.follow_links),
        }
    }

    /// Load overrides from a JSON file and apply them onto the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ArchiveError::from(e).with_context(format!("reading config {}", path.display()))
        })?;
        let overrides: PackConfigOverrides = serde_json::from_str(&raw)
            .map_err(|e| ArchiveError::from(e).with_context(format!("{}", path.display())))?;
        Self::default().apply(overrides).validated()
    }

    /// Reject values the gzip and tar layers cannot represent.
    pub fn validated(self) -> Result<Self> {
        if self.compression_level > 9 {
            return Err(ArchiveError::decode(format!(
                "compression_level {} out of range 0..=9",
                self.compression_level
            )));
        }
        if self.default_mode > 0o7777 {
            return Err(ArchiveError::decode(format!(
                "default_mode {:o} is not a permission mask",
                self.default_mode
            )));
        }
        Ok(self)
    }
}
