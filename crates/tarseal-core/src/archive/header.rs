use crate::errors::{ArchiveError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tar::{EntryType, Header};

/// Kind of archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Any other tar typeflag, reported by the inspector only.
    Other(u8),
}

impl EntryKind {
    pub(crate) fn from_tar(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Regular | EntryType::Continuous => Self::File,
            EntryType::Directory => Self::Directory,
            EntryType::Symlink => Self::Symlink,
            other => Self::Other(other.as_byte()),
        }
    }

    fn to_tar(self) -> EntryType {
        match self {
            Self::File => EntryType::Regular,
            Self::Directory => EntryType::Directory,
            Self::Symlink => EntryType::Symlink,
            Self::Other(byte) => EntryType::new(byte),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("reg"),
            Self::Directory => f.write_str("dir"),
            Self::Symlink => f.write_str("sym"),
            Self::Other(byte) => write!(f, "type:{}", *byte as char),
        }
    }
}

/// Fixed-size declaration preceding an entry's content.
///
/// `size` is binding: the writer fails the build unless exactly that many
/// content bytes follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub name: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
    pub change_time: DateTime<Utc>,
    pub link_target: Option<PathBuf>,
}

impl ArchiveHeader {
    pub fn file(name: impl Into<String>, size: u64, mode: u32, change_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            mode,
            size,
            change_time,
            link_target: None,
        }
    }

    pub fn directory(name: impl Into<String>, mode: u32, change_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            mode,
            size: 0,
            change_time,
            link_target: None,
        }
    }

    pub fn symlink(
        name: impl Into<String>,
        target: impl Into<PathBuf>,
        mode: u32,
        change_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Symlink,
            mode,
            size: 0,
            change_time,
            link_target: Some(target.into()),
        }
    }

    /// Build the on-disk GNU header. The path is set by the tar builder so
    /// long names get their extension record.
    pub(crate) fn to_tar(&self) -> Result<Header> {
        validate_name(&self.name)?;

        let mut header = Header::new_gnu();
        header.set_entry_type(self.kind.to_tar());
        header.set_size(self.size);
        header.set_mode(self.mode);
        header.set_uid(0);
        header.set_gid(0);

        let secs = self.change_time.timestamp().max(0) as u64;
        header.set_mtime(secs);
        if let Some(gnu) = header.as_gnu_mut() {
            gnu.set_ctime(secs);
        }

        if let Some(target) = &self.link_target {
            header.set_link_name(target).map_err(|e| {
                ArchiveError::format(format!("link target for {}: {e}", self.name))
            })?;
        }
        Ok(header)
    }
}

/// Entry names must be non-empty relative paths without `..`.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ArchiveError::format("entry name is empty"));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(ArchiveError::format(format!(
                    "entry name {name:?} contains '..'"
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::format(format!(
                    "entry name {name:?} must be relative"
                )))
            }
        }
    }
    Ok(())
}
