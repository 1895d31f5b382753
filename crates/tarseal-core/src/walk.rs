//! Filesystem walker: archive the trees under one or more roots.

use crate::archive::ArchiveHeader;
use crate::errors::{ArchiveError, Result};
use crate::pack::{ArchiveResult, Packed, Packer};
use std::fs::{self, File, Metadata};
use std::io::{BufReader, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

impl Packer {
    /// Pack every file under `roots` into memory.
    pub fn pack_paths<P: AsRef<Path>>(&self, roots: &[P]) -> Result<ArchiveResult> {
        self.pack_paths_into(Vec::new(), roots).map(ArchiveResult::from)
    }

    /// Walk each root in order and pack what it contains into `sink`.
    ///
    /// Entries are named relative to their root, in lexical order per
    /// directory. The root directory itself gets no entry; a root that is a
    /// plain file is stored under its base name. The first walk, stat or read
    /// error aborts the whole build.
    pub fn pack_paths_into<W: Write, P: AsRef<Path>>(
        &self,
        sink: W,
        roots: &[P],
    ) -> Result<Packed<W>> {
        let mut session = self.session(sink);
        let timestamp = self.timestamp();
        let excluded: Vec<PathBuf> = self.excluded().iter().map(|p| resolve(p)).collect();

        for root in roots {
            let root = root.as_ref();
            tracing::debug!(root = %root.display(), "walking");

            let walker = WalkDir::new(root)
                .follow_links(self.config().follow_links)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|item| !is_excluded(&excluded, item.path()));

            for item in walker {
                let item = item?;
                let path = item.path();
                let file_type = item.file_type();

                if item.depth() == 0 && file_type.is_dir() {
                    continue;
                }

                let name = archive_name(root, path)?;
                let metadata = item.metadata()?;
                let mode = mode_of(&metadata);

                if file_type.is_dir() {
                    session.write_header(&ArchiveHeader::directory(name, mode, timestamp))?;
                } else if file_type.is_symlink() {
                    let target = fs::read_link(path).map_err(|e| {
                        ArchiveError::from(e).with_context(format!("readlink {}", path.display()))
                    })?;
                    session.write_header(&ArchiveHeader::symlink(name, target, mode, timestamp))?;
                } else if file_type.is_file() {
                    let file = File::open(path).map_err(|e| {
                        ArchiveError::from(e).with_context(format!("open {}", path.display()))
                    })?;
                    let header = ArchiveHeader::file(name, metadata.len(), mode, timestamp);
                    session.write_content(&header, BufReader::new(file))?;
                } else {
                    tracing::debug!(path = %path.display(), "skipping special file");
                }
            }
        }

        session.finish()
    }
}

/// Absolute form of `path` with its parent resolved; the last component is
/// kept as-is so the path need not exist yet.
fn resolve(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    fs::canonicalize(parent)
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn is_excluded(excluded: &[PathBuf], path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    // Only resolve walked paths whose base name could match.
    excluded
        .iter()
        .any(|ex| ex.file_name() == Some(name) && resolve(path) == *ex)
}

/// Name of `path` inside the archive: relative to `root`, `/`-separated,
/// falling back to the root's base name when the two are the same path.
fn archive_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        ArchiveError::format(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            parts.push(utf8(part, path)?);
        }
    }

    if parts.is_empty() {
        let base = root
            .file_name()
            .ok_or_else(|| ArchiveError::format(format!("{} has no base name", root.display())))?;
        return Ok(utf8(base, path)?.to_string());
    }
    Ok(parts.join("/"))
}

fn utf8<'a>(part: &'a std::ffi::OsStr, path: &Path) -> Result<&'a str> {
    part.to_str()
        .ok_or_else(|| ArchiveError::format(format!("non UTF-8 path {}", path.display())))
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(metadata: &Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
