use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use std::path::Path;
use tarseal_core::{ArchiveError, PackConfig};
use tempfile::NamedTempFile;

pub mod apply;
mod dispatch;
pub mod fingerprint;
pub mod inspect;
pub mod pack;

pub use dispatch::dispatch;

/// Defaults, overridden by the JSON file from `--config` / `TARSEAL_CONFIG`.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<PackConfig> {
    match path {
        Some(path) => {
            let config = PackConfig::from_json_file(path)?;
            tracing::debug!(?config, path = %path.display(), "loaded config");
            Ok(config)
        }
        None => Ok(PackConfig::default()),
    }
}

pub(crate) fn resolve_timestamp(millis: Option<i64>) -> anyhow::Result<DateTime<Utc>> {
    match millis {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| ArchiveError::decode(format!("timestamp {ms} out of range")).into()),
        None => Ok(Utc::now()),
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(ArchiveError::from)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .map_err(ArchiveError::from)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

/// Temp file in the destination's directory, so a failed build never leaves
/// a partial file at `path`.
pub(crate) fn stage_beside(path: &Path) -> anyhow::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .map_err(ArchiveError::from)
        .with_context(|| format!("failed to stage output in {}", dir.display()))
}

pub(crate) fn persist(staged: NamedTempFile, path: &Path) -> anyhow::Result<()> {
    staged
        .persist(path)
        .map_err(|e| ArchiveError::from(e.error))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
