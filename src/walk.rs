//! Directory tree enumeration for compression.
//!
//! [`walk`] produces every filesystem node under a root, depth-first with
//! siblings sorted by file name, so the same tree always yields the same
//! entry order. Symbolic links are reported as links and never followed.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::timestamp::Timestamp;
use crate::{ArchivePath, Result};

/// The kind of filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
}

/// Metadata captured for a node at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Node kind.
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: Timestamp,
    /// Unix permission bits, where the platform has them.
    pub mode: Option<u32>,
}

impl EntryMetadata {
    /// Captures metadata without following symlinks.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let modified = metadata
            .modified()
            .map(Timestamp::from_system_time)
            .unwrap_or(Timestamp::from_unix_secs(0));
        Self {
            kind,
            size: if kind == EntryKind::Directory { 0 } else { metadata.len() },
            modified,
            mode: unix_mode(metadata),
        }
    }
}

#[cfg(unix)]
fn unix_mode(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &Metadata) -> Option<u32> {
    None
}

/// One node discovered under a root.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the root; empty for the root itself.
    pub relative: PathBuf,
    /// Captured metadata.
    pub metadata: EntryMetadata,
}

impl TreeEntry {
    /// Builds an entry for a single file archived under its own name.
    ///
    /// A symlinked file is archived with the content it points to.
    pub fn single_file(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)?;
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' has no file name", path.display()),
            )
        })?;
        let metadata = EntryMetadata::from_metadata(&fs::metadata(&path)?);
        Ok(Self {
            relative: PathBuf::from(name),
            path,
            metadata,
        })
    }

    /// Returns true for the walk root.
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// Returns the archive entry name for this node.
    pub fn archive_path(&self) -> Result<ArchivePath> {
        ArchivePath::from_relative(&self.relative)
    }
}

/// Enumerates the full subtree rooted at `root`, root included.
///
/// The root is canonicalized so every returned `path` is absolute.
///
/// # Errors
///
/// Fails if the root is missing or any node cannot be read.
pub fn walk(root: &Path) -> Result<Vec<TreeEntry>> {
    let root = fs::canonicalize(root)?;
    let mut entries = Vec::new();

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let metadata = entry.metadata().map_err(io::Error::from)?;
        entries.push(TreeEntry {
            path: entry.path().to_path_buf(),
            relative,
            metadata: EntryMetadata::from_metadata(&metadata),
        });
    }

    log::debug!("Enumerated {} entries under '{}'", entries.len(), root.display());
    Ok(entries)
}
