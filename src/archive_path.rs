//! Archive entry names with validation for secure path handling.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Maximum length for archive entry names (in bytes).
///
/// ZIP stores name lengths in 16 bits.
const MAX_PATH_LENGTH: usize = u16::MAX as usize;

/// A validated, `/`-separated entry name relative to the archive root.
///
/// `ArchivePath` guarantees that:
/// - No NUL bytes are present
/// - The path is not absolute (does not start with `/` or a drive letter)
/// - No empty segments exist (no `//`)
/// - No `.` or `..` segments are present
///
/// A single trailing `/` (the ZIP directory marker) is accepted by
/// [`ArchivePath::new`] and stripped.
///
/// # Examples
///
/// ```
/// use zipmerge::ArchivePath;
///
/// let path = ArchivePath::new("dir/file.txt").unwrap();
/// assert_eq!(path.as_str(), "dir/file.txt");
///
/// assert!(ArchivePath::new("../secret").is_err());
/// assert!(ArchivePath::new("/absolute/path").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Parses and validates an entry name as stored in an archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is empty, absolute,
    /// contains NUL bytes, empty segments, or `.`/`..` segments.
    pub fn new(s: &str) -> Result<Self> {
        let trimmed = s.strip_suffix('/').unwrap_or(s);
        Self::validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Builds an entry name from a filesystem path relative to the tree root.
    ///
    /// Platform separators are normalized to `/`.
    pub fn from_relative(relative: &Path) -> Result<Self> {
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| {
                        Error::Io(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("non UTF-8 file name: {}", relative.display()),
                        ))
                    })?;
                    segments.push(segment);
                }
                Component::CurDir => {}
                _ => {
                    return Err(Error::invalid_argument(
                        "path",
                        format!("'{}' is not a relative path", relative.display()),
                    ));
                }
            }
        }
        let joined = segments.join("/");
        Self::validate(&joined)?;
        Ok(Self(joined))
    }

    fn validate(s: &str) -> Result<()> {
        let reject = |reason: &str| Err(Error::invalid_argument("path", format!("'{}' {}", s, reason)));

        if s.is_empty() {
            return reject("is empty");
        }
        if s.len() > MAX_PATH_LENGTH {
            return reject("exceeds the maximum entry name length");
        }
        if s.contains('\0') {
            return reject("contains a NUL byte");
        }
        if s.starts_with('/') || s.starts_with('\\') || has_drive_prefix(s) {
            return reject("is absolute");
        }
        for segment in s.split(['/', '\\']) {
            match segment {
                "" => return reject("contains an empty segment"),
                "." | ".." => return reject("contains a relative segment"),
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns the entry name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name with the trailing `/` ZIP uses for directory entries.
    pub fn directory_name(&self) -> String {
        format!("{}/", self.0)
    }

    /// Returns the number of `/`-separated segments.
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// Resolves this entry under an extraction root.
    pub fn join_to(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Validates an entry name read from an archive and returns its destination.
///
/// Any name that would escape `dest_root` is reported as
/// [`Error::PathTraversal`].
pub fn validate_extract_path(name: &str, dest_root: &Path, entry_index: usize) -> Result<PathBuf> {
    let path = ArchivePath::new(name).map_err(|_| Error::PathTraversal {
        entry_index,
        path: name.to_string(),
    })?;
    Ok(path.join_to(dest_root))
}

/// Validates the target of a symbolic link entry.
///
/// Link targets must be relative and must not climb above the link's own
/// directory depth inside the archive.
pub fn validate_link_target(link: &ArchivePath, target: &str, entry_index: usize) -> Result<()> {
    let escape = || Error::PathTraversal {
        entry_index,
        path: format!("{} -> {}", link, target),
    };

    if target.is_empty() || target.contains('\0') {
        return Err(escape());
    }
    if target.starts_with('/') || target.starts_with('\\') || has_drive_prefix(target) {
        return Err(escape());
    }

    // Depth of the directory containing the link.
    let mut depth = link.depth() as isize - 1;
    for segment in target.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return Err(escape());
                }
            }
            _ => depth += 1,
        }
    }
    Ok(())
}
