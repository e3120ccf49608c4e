//! Removal of platform metadata sidecar files before archiving.
//!
//! Desktop indexers drop files such as `.DS_Store` into every directory they
//! touch. They carry no content and must never be persisted into an archive
//! by a directory merge.

use std::fs;
use std::path::Path;

use crate::Result;
use crate::options::DEFAULT_SIDECAR_NAMES;

/// Deletes known sidecar files among the direct children of a directory.
///
/// Only the top level is inspected; subdirectories are left untouched.
#[derive(Debug, Clone)]
pub struct HygieneFilter {
    names: Vec<String>,
}

impl Default for HygieneFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_NAMES.iter().copied())
    }
}

impl HygieneFilter {
    /// Creates a filter for the given file names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `name` is a sidecar file name.
    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Removes matching sidecar files from `dir` and returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Fails if `dir` cannot be listed or a matching file cannot be removed.
    pub fn clean(&self, dir: &Path) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| self.matches(n)) && !entry.file_type()?.is_dir() {
                fs::remove_file(entry.path())?;
                log::debug!("Removed sidecar file '{}'", entry.path().display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}
