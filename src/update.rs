//! Archive update: merging new content into an existing archive.
//!
//! An update reconstructs the destination archive's file tree in a staging
//! directory, merge-copies the source over it and recompresses the result
//! into the destination. When the destination does not exist yet the source
//! is compressed directly and no staging directory is created.
//!
//! Paths present in both the prior archive and the source always take the
//! source's version.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipmerge::{ArchiveUpdater, CommitMode, CompressionLevel, UpdateOptions};
//!
//! fn main() -> zipmerge::Result<()> {
//!     let updater = ArchiveUpdater::new(
//!         UpdateOptions::new()
//!             .level(CompressionLevel::BEST)
//!             .commit(CommitMode::AtomicRename),
//!     );
//!     let result = updater.update_with_directory("assets", "bundle.zip")?;
//!     println!("{} entries written", result.entries_written);
//!     Ok(())
//! }
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use crate::codec::{self, CompressStats, ExtractResult};
use crate::hygiene::HygieneFilter;
use crate::options::{CommitMode, CompressionLevel, ExtractOptions, UpdateOptions};
use crate::staging::{HeldModes, StagingArea, StagingRoot};
use crate::walk::{self, EntryKind, TreeEntry};
use crate::{Error, ExpectedKind, Result};

/// What an update merges into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A single regular file, stored under its basename.
    File,
    /// A directory whose contents are stored relative to it.
    Directory,
}

impl SourceKind {
    fn expected(self) -> ExpectedKind {
        match self {
            Self::File => ExpectedKind::File,
            Self::Directory => ExpectedKind::Directory,
        }
    }
}

/// A fully specified update, as received from a caller.
///
/// The level is kept as a raw integer so that out-of-range values coming
/// across a process boundary are rejected by [`UpdateRequest::validate`]
/// together with the other arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// File or directory to merge.
    pub source: PathBuf,
    /// Archive to create or update.
    pub destination: PathBuf,
    /// Deflate level, 1-9.
    pub level: u32,
    /// Explicit staging directory; derived from the staging root when `None`.
    pub staging_dir: Option<PathBuf>,
    /// Whether `source` is a file or a directory.
    pub kind: SourceKind,
}

impl UpdateRequest {
    /// Creates a request without an explicit staging directory.
    pub fn new(
        kind: SourceKind,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        level: u32,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            level,
            staging_dir: None,
            kind,
        }
    }

    /// Sets an explicit staging directory.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Checks every argument without touching the filesystem.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the source, destination or explicit
    ///   staging path is empty
    /// - [`Error::InvalidCompressionLevel`] if the level is outside 1-9
    pub fn validate(&self) -> Result<CompressionLevel> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::invalid_argument("source", "must not be empty"));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(Error::invalid_argument("destination", "must not be empty"));
        }
        if self
            .staging_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(Error::invalid_argument("staging_dir", "must not be empty"));
        }
        CompressionLevel::new(self.level)
    }
}

/// Counters for a finished update.
#[must_use = "update result should be checked to verify the archive content"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// True when a prior archive existed and its entries were merged.
    pub merged: bool,
    /// Total entries in the rewritten archive.
    pub entries_written: usize,
    /// Regular file entries.
    pub files_written: usize,
    /// Directory entries.
    pub directories_written: usize,
    /// Symbolic link entries.
    pub symlinks_written: usize,
    /// Uncompressed bytes of file content.
    pub bytes_written: u64,
}

impl UpdateResult {
    fn from_stats(merged: bool, stats: &CompressStats) -> Self {
        Self {
            merged,
            entries_written: stats.entries_written(),
            files_written: stats.files_written,
            directories_written: stats.directories_written,
            symlinks_written: stats.symlinks_written,
            bytes_written: stats.bytes_written,
        }
    }
}

/// The tree that ends up in the archive.
#[derive(Debug, Clone, Copy)]
enum EffectiveTree<'a> {
    /// Every node below a directory.
    Directory(&'a Path),
    /// One file, stored under its basename.
    SingleFile(&'a Path),
}

/// Runs updates with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct ArchiveUpdater {
    options: UpdateOptions,
}

impl ArchiveUpdater {
    /// Creates an updater with the given options.
    pub fn new(options: UpdateOptions) -> Self {
        Self { options }
    }

    /// Returns the updater's options.
    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    /// Merges a single file into `destination` at the root of the archive.
    pub fn update_with_file(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<UpdateResult> {
        self.update(&self.request(SourceKind::File, source.as_ref(), destination.as_ref()))
    }

    /// Merges the contents of a directory into `destination`.
    pub fn update_with_directory(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<UpdateResult> {
        self.update(&self.request(
            SourceKind::Directory,
            source.as_ref(),
            destination.as_ref(),
        ))
    }

    fn request(&self, kind: SourceKind, source: &Path, destination: &Path) -> UpdateRequest {
        UpdateRequest {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            level: self.options.level.get(),
            staging_dir: self.options.staging_dir.clone(),
            kind,
        }
    }

    /// Executes an update request.
    ///
    /// Arguments and the source are checked before anything on disk is
    /// modified. A staging directory, if one was created, is removed before
    /// this returns.
    ///
    /// # Errors
    ///
    /// - argument errors (see [`Error::is_invalid_argument`])
    /// - [`Error::CorruptArchive`] if the existing destination cannot be read
    /// - [`Error::Io`] for filesystem failures
    /// - [`Error::StagingCleanup`] if the staging directory could not be
    ///   removed, carrying any earlier failure as its primary error
    pub fn update(&self, request: &UpdateRequest) -> Result<UpdateResult> {
        let level = request.validate()?;
        check_source(&request.source, request.kind)?;
        let destination_exists = probe_destination(&request.destination)?;

        let hygiene = HygieneFilter::new(self.options.sidecar_names.iter().cloned());
        if request.kind == SourceKind::Directory {
            hygiene.clean(&request.source)?;
        }

        let result = if destination_exists {
            let staging_path = request
                .staging_dir
                .clone()
                .unwrap_or_else(|| self.options.staging_root.derive());
            let staging = StagingArea::acquire(staging_path)?;
            let outcome = self.merge_and_commit(&staging, request, level, &hygiene);
            staging.release_after(outcome)?
        } else {
            let tree = match request.kind {
                SourceKind::File => EffectiveTree::SingleFile(&request.source),
                SourceKind::Directory => EffectiveTree::Directory(&request.source),
            };
            let stats = commit(tree, &request.destination, level, self.options.commit)?;
            UpdateResult::from_stats(false, &stats)
        };

        log::debug!(
            "Updated '{}' from '{}': {} entries, merged={}",
            request.destination.display(),
            request.source.display(),
            result.entries_written,
            result.merged
        );
        Ok(result)
    }

    fn merge_and_commit(
        &self,
        staging: &StagingArea,
        request: &UpdateRequest,
        level: CompressionLevel,
        hygiene: &HygieneFilter,
    ) -> Result<UpdateResult> {
        let extract_options = ExtractOptions::new().threads(self.options.threads);
        let _ = codec::extract(&request.destination, staging.path(), &extract_options)?;
        let mut held = staging.unlock()?;

        match request.kind {
            SourceKind::File => merge_file(&request.source, staging.path())?,
            SourceKind::Directory => {
                hygiene.clean(staging.path())?;
                let excluded = canonical_existing(&request.destination);
                merge_tree(
                    &request.source,
                    staging.path(),
                    excluded.as_deref(),
                    &mut held,
                )?;
            }
        }
        held.restore()?;

        let stats = commit(
            EffectiveTree::Directory(staging.path()),
            &request.destination,
            level,
            self.options.commit,
        )?;
        Ok(UpdateResult::from_stats(true, &stats))
    }
}

fn default_updater(level: u32) -> Result<ArchiveUpdater> {
    let options = UpdateOptions {
        level: CompressionLevel::new(level)?,
        staging_root: StagingRoot::from_env(),
        ..UpdateOptions::default()
    };
    Ok(ArchiveUpdater::new(options))
}

/// Merges a single file into an archive, creating the archive if needed.
///
/// The file is stored at the archive root under its basename, replacing an
/// entry of the same name.
///
/// # Example
///
/// ```rust,no_run
/// let result = zipmerge::update_with_file("report.txt", "reports.zip", 6)?;
/// assert!(result.files_written >= 1);
/// # Ok::<(), zipmerge::Error>(())
/// ```
///
/// # Errors
///
/// See [`ArchiveUpdater::update`]. Empty paths and levels outside 1-9 are
/// rejected before the filesystem is touched.
pub fn update_with_file(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    level: u32,
) -> Result<UpdateResult> {
    let request = UpdateRequest::new(
        SourceKind::File,
        source.as_ref(),
        destination.as_ref(),
        level,
    );
    request.validate()?;
    default_updater(level)?.update(&request)
}

/// Merges a directory's contents into an archive, creating the archive if
/// needed.
///
/// # Errors
///
/// See [`ArchiveUpdater::update`].
pub fn update_with_directory(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    level: u32,
) -> Result<UpdateResult> {
    let request = UpdateRequest::new(
        SourceKind::Directory,
        source.as_ref(),
        destination.as_ref(),
        level,
    );
    request.validate()?;
    default_updater(level)?.update(&request)
}

/// Extracts every entry of `archive` into `destination`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for empty paths, otherwise the errors
/// of [`extract_with_options`].
pub fn extract(archive: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<ExtractResult> {
    extract_with_options(archive, destination, &ExtractOptions::default())
}

/// Extracts every entry of `archive` into `destination` with custom options.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for empty paths
/// - [`Error::CorruptArchive`] or [`Error::PathTraversal`] for bad archives
/// - [`Error::Io`] for filesystem failures
pub fn extract_with_options(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ExtractResult> {
    let archive = archive.as_ref();
    let destination = destination.as_ref();
    if archive.as_os_str().is_empty() {
        return Err(Error::invalid_argument("archive", "must not be empty"));
    }
    if destination.as_os_str().is_empty() {
        return Err(Error::invalid_argument("destination", "must not be empty"));
    }
    codec::extract(archive, destination, options)
}

fn check_source(path: &Path, kind: SourceKind) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(Error::Io(e)),
    };
    let matches = match kind {
        SourceKind::File => metadata.is_file(),
        SourceKind::Directory => metadata.is_dir(),
    };
    if !matches {
        return Err(Error::SourceKindMismatch {
            path: path.display().to_string(),
            expected: kind.expected(),
        });
    }
    Ok(())
}

/// Returns whether a prior archive exists at `path`.
fn probe_destination(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Err(Error::invalid_argument(
            "destination",
            format!("'{}' is a directory", path.display()),
        )),
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

fn canonical_existing(path: &Path) -> Option<PathBuf> {
    fs::canonicalize(path).ok()
}

/// Copies one file into the root of `target`, replacing whatever holds its name.
fn merge_file(source: &Path, target: &Path) -> Result<()> {
    let name = source.file_name().ok_or_else(|| {
        Error::invalid_argument(
            "source",
            format!("'{}' has no file name", source.display()),
        )
    })?;
    let metadata = fs::metadata(source)?;
    let target_path = target.join(name);
    clear_for_file(&target_path)?;
    fs::copy(source, &target_path)?;
    restore_mtime(&target_path, &metadata);
    Ok(())
}

/// Recursively merge-copies `source` over `target`.
///
/// Nodes only in `target` are kept. Nodes in both are replaced by the
/// source node, including when one side is a directory and the other is not.
/// Merged directories take the source's mode and mtime.
fn merge_tree(
    source: &Path,
    target: &Path,
    excluded: Option<&Path>,
    held: &mut HeldModes,
) -> Result<()> {
    let entries = walk::walk(source)?;
    let mut directories = Vec::new();

    for entry in entries
        .iter()
        .filter(|e| !e.is_root() && excluded != Some(e.path.as_path()))
    {
        let target_path = target.join(&entry.relative);
        match entry.metadata.kind {
            EntryKind::Directory => {
                match fs::symlink_metadata(&target_path) {
                    Ok(existing) if existing.is_dir() => {}
                    Ok(_) => {
                        fs::remove_file(&target_path)?;
                        fs::create_dir(&target_path)?;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        fs::create_dir_all(&target_path)?;
                    }
                    Err(e) => return Err(Error::Io(e)),
                }
                held.forget(&target_path);
                directories.push(entry);
            }
            EntryKind::File => {
                clear_for_file(&target_path)?;
                fs::copy(&entry.path, &target_path)?;
                set_mtime(&target_path, entry);
            }
            EntryKind::Symlink => {
                clear_for_file(&target_path)?;
                copy_symlink(&entry.path, &target_path)?;
            }
        }
    }

    directories.sort_by_key(|e| std::cmp::Reverse(e.relative.components().count()));
    for entry in directories {
        let path = target.join(&entry.relative);
        set_mode(&path, entry);
        set_mtime(&path, entry);
    }

    log::debug!(
        "Merged '{}' into '{}'",
        source.display(),
        target.display()
    );
    Ok(())
}

/// Removes a file, link or directory occupying `path`.
fn clear_for_file(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(existing) if existing.is_dir() => Ok(fs::remove_dir_all(path)?),
        Ok(_) => Ok(fs::remove_file(path)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    fs::copy(source, target)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, entry: &TreeEntry) {
    use std::os::unix::fs::PermissionsExt;
    let Some(mode) = entry.metadata.mode else {
        return;
    };
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        log::warn!("Failed to set permissions on '{}': {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _entry: &TreeEntry) {}

fn set_mtime(path: &Path, entry: &TreeEntry) {
    if let Err(e) = filetime::set_file_mtime(path, entry.metadata.modified.as_filetime()) {
        log::warn!(
            "Failed to set modification time on '{}': {}",
            path.display(),
            e
        );
    }
}

fn restore_mtime(path: &Path, metadata: &fs::Metadata) {
    let mtime = filetime::FileTime::from_last_modification_time(metadata);
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        log::warn!(
            "Failed to set modification time on '{}': {}",
            path.display(),
            e
        );
    }
}

fn enumerate(tree: EffectiveTree<'_>, excluded: &[PathBuf]) -> Result<Vec<TreeEntry>> {
    match tree {
        EffectiveTree::SingleFile(path) => Ok(vec![TreeEntry::single_file(path)?]),
        EffectiveTree::Directory(root) => {
            let mut entries = walk::walk(root)?;
            entries.retain(|e| !excluded.contains(&e.path));
            Ok(entries)
        }
    }
}

/// Writes the effective tree to `destination`.
fn commit(
    tree: EffectiveTree<'_>,
    destination: &Path,
    level: CompressionLevel,
    mode: CommitMode,
) -> Result<CompressStats> {
    match mode {
        CommitMode::Truncate => commit_truncate(tree, destination, level),
        CommitMode::AtomicRename => commit_atomic(tree, destination, level),
    }
}

/// Truncates the destination first, then enumerates and compresses into it.
fn commit_truncate(
    tree: EffectiveTree<'_>,
    destination: &Path,
    level: CompressionLevel,
) -> Result<CompressStats> {
    let file = File::create(destination)?;
    let excluded: Vec<PathBuf> = canonical_existing(destination).into_iter().collect();
    let entries = enumerate(tree, &excluded)?;
    let stats = compress_into(&entries, &file, level)?;
    file.sync_all()?;
    Ok(stats)
}

/// Compresses into a sibling temporary file and renames it over the destination.
fn commit_atomic(
    tree: EffectiveTree<'_>,
    destination: &Path,
    level: CompressionLevel,
) -> Result<CompressStats> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".zipmerge-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    let mut excluded: Vec<PathBuf> = canonical_existing(temp.path()).into_iter().collect();
    excluded.extend(canonical_existing(destination));
    let entries = enumerate(tree, &excluded)?;

    let stats = compress_into(&entries, temp.as_file(), level)?;
    temp.as_file().sync_all()?;
    match fs::metadata(destination) {
        Ok(prior) => fs::set_permissions(temp.path(), prior.permissions())?,
        Err(_) => set_default_permissions(temp.path())?,
    }
    temp.persist(destination).map_err(|e| Error::Io(e.error))?;
    Ok(stats)
}

#[cfg(unix)]
fn set_default_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_default_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn compress_into(
    entries: &[TreeEntry],
    file: &File,
    level: CompressionLevel,
) -> Result<CompressStats> {
    let (writer, stats) = codec::compress(entries, BufWriter::new(file), level)?;
    finish_writer(writer)?;
    Ok(stats)
}

fn finish_writer<W: Write + Seek>(writer: BufWriter<W>) -> Result<()> {
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    Ok(())
}
