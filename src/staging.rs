//! Scratch directories for materializing an archive during a merge.
//!
//! A [`StagingArea`] is owned by exactly one in-flight update. It is created
//! when the update needs to extract an existing archive and is removed before
//! the update returns, on success and on failure alike.
//!
//! Release is explicit: [`StagingArea::release`] and
//! [`StagingArea::release_after`] report removal failures instead of
//! swallowing them. The `Drop` impl only reclaims directories that were never
//! released, which happens when a panic unwinds through the update.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Environment variable that overrides the default staging root.
pub const STAGING_ROOT_ENV: &str = "ZIPMERGE_STAGING_ROOT";

/// Directory name used under the system temp dir when no root is configured.
const DEFAULT_ROOT_NAME: &str = ".zipmerge";

/// Disambiguates staging directories derived within the same second.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// The directory under which staging areas are derived.
///
/// # Example
///
/// ```rust
/// use zipmerge::StagingRoot;
///
/// let root = StagingRoot::new("/var/tmp/zipmerge");
/// let a = root.derive();
/// let b = root.derive();
/// assert_ne!(a, b);
/// assert!(a.starts_with("/var/tmp/zipmerge"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingRoot {
    path: PathBuf,
}

impl StagingRoot {
    /// Creates a staging root at the given directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the root from `ZIPMERGE_STAGING_ROOT`, falling back to the default.
    pub fn from_env() -> Self {
        match std::env::var_os(STAGING_ROOT_ENV) {
            Some(value) if !value.is_empty() => Self::new(value),
            _ => Self::default(),
        }
    }

    /// Returns the root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Derives a fresh staging path: `<root>/<unix-secs>-<pid>-<seq>`.
    ///
    /// Paths are unique within a process. Separate processes sharing a root
    /// are told apart by their process id.
    pub fn derive(&self) -> PathBuf {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.path
            .join(format!("{}-{}-{}", secs, std::process::id(), seq))
    }
}

impl Default for StagingRoot {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_ROOT_NAME))
    }
}

/// An exclusively owned scratch directory.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    armed: bool,
}

impl StagingArea {
    /// Creates the staging directory, including missing parents.
    ///
    /// An existing empty directory is adopted. A non-empty one is refused so
    /// stale content from another run never leaks into the merged archive.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("staging_dir", "must not be empty"));
        }

        match fs::create_dir_all(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(e) => return Err(Error::Io(e)),
        }

        if fs::read_dir(path)?.next().is_some() {
            return Err(Error::invalid_argument(
                "staging_dir",
                format!("'{}' is not empty", path.display()),
            ));
        }

        log::debug!("Acquired staging directory '{}'", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            armed: true,
        })
    }

    /// Returns the staging directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively removes the staging directory.
    ///
    /// A directory that is already gone counts as released.
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        remove_tree(&self.path).map_err(|source| Error::StagingCleanup {
            path: self.path.display().to_string(),
            source,
            primary: None,
        })
    }

    /// Makes every directory below the staging root owner-writable.
    ///
    /// Extraction restores stored directory modes, so a prior archive can
    /// leave read-only directories behind that the merge must write into.
    /// The lifted modes are returned so they can be put back before the
    /// tree is compressed.
    pub fn unlock(&self) -> Result<HeldModes> {
        let mut held = HeldModes::default();
        unlock_tree(&self.path, &mut held.entries)?;
        if !held.entries.is_empty() {
            log::debug!(
                "Lifted {} read-only directory modes in '{}'",
                held.entries.len(),
                self.path.display()
            );
        }
        Ok(held)
    }

    /// Releases the staging directory after an operation finished.
    ///
    /// If both the operation and the release fail, the release error is
    /// returned with the operation's error attached as `primary`.
    pub fn release_after<T>(self, outcome: Result<T>) -> Result<T> {
        match (outcome, self.release()) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(primary), Ok(())) => Err(primary),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(primary), Err(Error::StagingCleanup { path, source, .. })) => {
                Err(Error::StagingCleanup {
                    path,
                    source,
                    primary: Some(Box::new(primary)),
                })
            }
            (Err(primary), Err(_)) => Err(primary),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match remove_tree(&self.path) {
            Ok(()) => log::warn!(
                "Staging directory '{}' was not released explicitly; removed on drop",
                self.path.display()
            ),
            Err(e) => log::warn!(
                "Failed to remove unreleased staging directory '{}': {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Directory modes lifted by [`StagingArea::unlock`].
#[derive(Debug, Default)]
pub struct HeldModes {
    entries: Vec<(PathBuf, u32)>,
}

impl HeldModes {
    /// Drops the held mode for `path`, whose mode is now owned by someone else.
    pub fn forget(&mut self, path: &Path) {
        self.entries.retain(|(held, _)| held != path);
    }

    /// Puts the held modes back, deepest directories first.
    ///
    /// Directories removed since they were unlocked are skipped.
    pub fn restore(mut self) -> Result<()> {
        self.entries
            .sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode) in &self.entries {
            match set_mode(path, *mode) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    let removed = match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            unlock_tree(path, &mut Vec::new())?;
            fs::remove_dir_all(path)
        }
        other => other,
    };
    match removed {
        Ok(()) => {
            log::debug!("Released staging directory '{}'", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Adds owner `rwx` to every directory below `dir`, recording prior modes.
#[cfg(unix)]
fn unlock_tree(dir: &Path, held: &mut Vec<(PathBuf, u32)>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let mode = entry.metadata()?.permissions().mode() & 0o7777;
        if mode & 0o700 != 0o700 {
            set_mode(&path, mode | 0o700)?;
            held.push((path.clone(), mode));
        }
        unlock_tree(&path, held)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn unlock_tree(_dir: &Path, _held: &mut Vec<(PathBuf, u32)>) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Returns true if `name` looks like a directory produced by [`StagingRoot::derive`].
pub fn is_staging_dir_name(name: &OsStr) -> bool {
    let Some(name) = name.to_str() else {
        return false;
    };
    let parts: Vec<&str> = name.split('-').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}
