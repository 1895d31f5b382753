//! Resource-management boundary: stored state in, updated state out.
//!
//! A resource holds an ordered list of base64 sources plus the state of the
//! last build. This module decides nothing about *when* to run; callers invoke
//! [`ArchiveResource::create`], [`read`](ArchiveResource::read) or
//! [`update`](ArchiveResource::update), and [`plan`] tells them whether the
//! planned sources differ from what is stored.

use crate::archive::MIMETYPE;
use crate::config::PackConfig;
use crate::digest::Digest;
use crate::errors::{ArchiveError, Result};
use crate::fingerprint::compute_or_reuse_digest;
use crate::pack::{ArchiveEntry, Content, Packer};
use base64::write::EncoderWriter;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};

/// One planned source: base64 content and where it lands in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub base64: String,
    pub location: String,
    /// Permission bits; defaults to read/write for the owner only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perm: Option<u32>,
}

impl SourceSpec {
    pub fn new(location: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        Self {
            base64: STANDARD.encode(content),
            location: location.into(),
            perm: None,
        }
    }
}

/// A source as stored after a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    #[serde(flatten)]
    pub spec: SourceSpec,
    pub digest: Digest,
}

/// Stored result of the last build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveState {
    /// Aggregate digest of the uncompressed tar stream.
    pub digest: Digest,
    pub content_digest: Digest,
    pub sources: Vec<SourceState>,
    /// Unix milliseconds shared by every entry of the build.
    pub timestamp: i64,
    pub archiveb64: String,
    pub mimetype: String,
}

impl ArchiveState {
    pub fn built_at(&self) -> Result<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .ok_or_else(|| ArchiveError::decode(format!("invalid timestamp {}", self.timestamp)))
    }

    /// Finished archive bytes.
    pub fn archive_bytes(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.archiveb64)?)
    }

    fn specs(&self) -> Vec<SourceSpec> {
        self.sources.iter().map(|s| s.spec.clone()).collect()
    }
}

/// Per-source comparison against stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSource {
    pub spec: SourceSpec,
    pub digest: Digest,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub sources: Vec<PlannedSource>,
    /// Any difference at all: content, location, perm, count, or no prior state.
    pub changed: bool,
}

/// Fingerprint the planned sources and diff them against `prior` by position.
pub fn plan(prior: Option<&ArchiveState>, sources: &[SourceSpec]) -> Result<Plan> {
    let stored: &[SourceState] = prior.map(|p| p.sources.as_slice()).unwrap_or_default();

    let mut planned = Vec::with_capacity(sources.len());
    for (i, spec) in sources.iter().enumerate() {
        let previous = stored.get(i);
        let decision = compute_or_reuse_digest(previous.map(|s| &s.digest), &spec.base64)
            .map_err(|e| e.with_context(format!("source #{i} ({})", spec.location)))?;
        let moved = previous
            .map_or(true, |s| s.spec.location != spec.location || s.spec.perm != spec.perm);

        planned.push(PlannedSource {
            spec: spec.clone(),
            digest: decision.digest,
            changed: decision.changed || moved,
        });
    }

    let changed =
        prior.is_none() || stored.len() != sources.len() || planned.iter().any(|s| s.changed);
    Ok(Plan {
        sources: planned,
        changed,
    })
}

/// Builds and rebuilds archive state.
#[derive(Debug, Clone, Default)]
pub struct ArchiveResource {
    config: PackConfig,
}

impl ArchiveResource {
    pub fn new(config: PackConfig) -> Self {
        Self { config }
    }

    /// First build, stamped with `now`.
    pub fn create(&self, sources: &[SourceSpec], now: DateTime<Utc>) -> Result<ArchiveState> {
        self.generate(now, sources)
    }

    /// Rebuild the stored sources with the stored timestamp.
    pub fn read(&self, prior: &ArchiveState) -> Result<ArchiveState> {
        self.generate(prior.built_at()?, &prior.specs())
    }

    /// Rebuild for new sources. Unchanged sources keep the prior timestamp, so
    /// the archive is reproduced exactly; any change regenerates with `now`.
    pub fn update(
        &self,
        prior: &ArchiveState,
        sources: &[SourceSpec],
        now: DateTime<Utc>,
    ) -> Result<ArchiveState> {
        let plan = plan(Some(prior), sources)?;
        let timestamp = if plan.changed { now } else { prior.built_at()? };
        tracing::debug!(changed = plan.changed, %timestamp, "updating archive");
        self.generate(timestamp, sources)
    }

    /// Build `base64(gzip(tar))` through an anonymous staging file, which the
    /// OS reclaims on every exit path.
    fn generate(&self, timestamp: DateTime<Utc>, sources: &[SourceSpec]) -> Result<ArchiveState> {
        let entries: Vec<ArchiveEntry> = sources
            .iter()
            .map(|s| ArchiveEntry {
                name: s.location.clone(),
                content: Content::Base64(s.base64.clone()),
                mode: s.perm,
            })
            .collect();

        let staging = tempfile::tempfile()
            .map_err(|e| ArchiveError::from(e).with_context("creating staging file"))?;
        let packed = Packer::new(timestamp)
            .with_config(self.config)
            .pack_into(EncoderWriter::new(staging, &STANDARD), &entries)?;

        let mut encoder = packed.sink;
        let mut staging = encoder
            .finish()
            .map_err(|e| ArchiveError::from(e).with_context("closing base64 layer"))?;
        staging.seek(SeekFrom::Start(0))?;
        let mut archiveb64 = String::new();
        staging.read_to_string(&mut archiveb64)?;

        let mut states = Vec::with_capacity(sources.len());
        for (spec, entry) in sources.iter().zip(&packed.entries) {
            let digest = entry
                .digest
                .ok_or_else(|| ArchiveError::format(format!("{} has no digest", entry.name)))?;
            states.push(SourceState {
                spec: spec.clone(),
                digest,
            });
        }

        Ok(ArchiveState {
            digest: packed.aggregate_digest,
            content_digest: packed.content_digest,
            sources: states,
            timestamp: timestamp.timestamp_millis(),
            archiveb64,
            mimetype: MIMETYPE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::inspect::summarize;
    use std::io::Cursor;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn sources() -> Vec<SourceSpec> {
        vec![
            SourceSpec::new("example.txt", "hello world"),
            SourceSpec::new("foo.bar", "what's up"),
        ]
    }

    #[test]
    fn create_records_digests_and_archive() {
        let state = ArchiveResource::default()
            .create(&sources(), at(1_700_000_000_123))
            .unwrap();

        assert_eq!(state.timestamp, 1_700_000_000_123);
        assert_eq!(state.mimetype, "application/tar+gzip");
        assert_eq!(state.sources[0].digest, fingerprint(b"hello world"));
        assert_eq!(state.sources[1].digest, fingerprint(b"what's up"));

        let summaries = summarize(Cursor::new(state.archive_bytes().unwrap())).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].name, "foo.bar");
        assert_eq!(summaries[1].size, 9);
    }

    #[test]
    fn read_reproduces_stored_archive() {
        let resource = ArchiveResource::default();
        let state = resource.create(&sources(), at(1_700_000_000_999)).unwrap();
        let again = resource.read(&state).unwrap();
        assert_eq!(again, state);
    }

    #[test]
    fn unchanged_update_keeps_timestamp() {
        let resource = ArchiveResource::default();
        let state = resource.create(&sources(), at(1_000)).unwrap();
        let updated = resource.update(&state, &sources(), at(9_000_000)).unwrap();
        assert_eq!(updated.timestamp, 1_000);
        assert_eq!(updated.archiveb64, state.archiveb64);
        assert_eq!(updated.digest, state.digest);
    }

    #[test]
    fn changed_content_regenerates() {
        let resource = ArchiveResource::default();
        let state = resource.create(&sources(), at(1_000)).unwrap();

        let mut next = sources();
        next[1] = SourceSpec::new("foo.bar", "not much");
        let updated = resource.update(&state, &next, at(9_000_000)).unwrap();

        assert_eq!(updated.timestamp, 9_000_000);
        assert_ne!(updated.digest, state.digest);
        assert_eq!(updated.sources[0].digest, state.sources[0].digest);
        assert_ne!(updated.sources[1].digest, state.sources[1].digest);
    }

    #[test]
    fn plan_detects_moves_and_count_changes() {
        let state = ArchiveResource::default()
            .create(&sources(), at(1_000))
            .unwrap();

        let mut moved = sources();
        moved[0].location = "renamed.txt".into();
        let p = plan(Some(&state), &moved).unwrap();
        assert!(p.changed);
        assert!(p.sources[0].changed);
        assert!(!p.sources[1].changed);

        let mut perm = sources();
        perm[1].perm = Some(0o644);
        assert!(plan(Some(&state), &perm).unwrap().changed);

        assert!(plan(Some(&state), &sources()[..1]).unwrap().changed);
        assert!(!plan(Some(&state), &sources()).unwrap().changed);
        assert!(plan(None, &sources()).unwrap().changed);
    }

    #[test]
    fn malformed_source_is_decode_error() {
        let mut bad = sources();
        bad[0].base64 = "%%%".into();
        let err = ArchiveResource::default().create(&bad, at(0)).unwrap_err();
        assert!(err.is_decode());

        let state = ArchiveResource::default().create(&sources(), at(0)).unwrap();
        assert!(plan(Some(&state), &bad).unwrap_err().is_decode());
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = ArchiveResource::default()
            .create(&sources(), at(42))
            .unwrap();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"location\":\"example.txt\""));
        let back: ArchiveState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
