//! Archive extraction to a directory.
//!
//! Extraction runs in three phases:
//! 1. Plan: read the central directory and validate every entry name.
//! 2. Write: create directories, then write files and links. With the
//!    `parallel` feature, files are decompressed on a rayon pool where each
//!    worker holds its own archive handle.
//! 3. Finish: restore directory metadata deepest-first, after their
//!    contents stopped changing.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::archive_path::{ArchivePath, validate_extract_path, validate_link_target};
use crate::options::ExtractOptions;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// Unix file type mask and symlink type bits.
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Counters for a finished extraction.
#[must_use = "extraction result should be checked to verify the archive content"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractResult {
    /// Regular files written.
    pub files_extracted: usize,
    /// Directories created from explicit directory entries.
    pub directories_extracted: usize,
    /// Symbolic links created.
    pub symlinks_extracted: usize,
    /// Uncompressed bytes written.
    pub bytes_extracted: u64,
}

impl ExtractResult {
    /// Returns the total number of entries extracted.
    pub fn entries_extracted(&self) -> usize {
        self.files_extracted + self.directories_extracted + self.symlinks_extracted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlannedKind {
    File,
    Directory,
    Symlink,
}

/// An entry whose name has been validated against the destination.
#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    name: ArchivePath,
    target: PathBuf,
    kind: PlannedKind,
    mode: Option<u32>,
    modified: Option<Timestamp>,
}

type ArchiveReader = ZipArchive<BufReader<File>>;

fn open_archive(path: &Path) -> Result<ArchiveReader> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| Error::from_zip(path, e))
}

/// Returns the entry names stored in an archive, in central directory order.
///
/// # Errors
///
/// Returns [`Error::CorruptArchive`] if the file is not a readable ZIP archive.
pub fn list_entries(archive: &Path) -> Result<Vec<String>> {
    let zip = open_archive(archive)?;
    Ok(zip.file_names().map(String::from).collect())
}

/// Extracts every entry of `archive` below `dest`, creating `dest` if needed.
///
/// # Errors
///
/// - [`Error::CorruptArchive`] if the archive cannot be parsed or an entry
///   fails to decompress
/// - [`Error::PathTraversal`] if an entry name or link target escapes `dest`
/// - [`Error::Io`] if the destination cannot be written
pub fn extract(archive: &Path, dest: &Path, options: &ExtractOptions) -> Result<ExtractResult> {
    let mut zip = open_archive(archive)?;
    let plan = plan_entries(&mut zip, archive, dest)?;

    fs::create_dir_all(dest)?;

    let mut result = ExtractResult::default();
    for entry in plan.iter().filter(|e| e.kind == PlannedKind::Directory) {
        fs::create_dir_all(&entry.target)?;
        result.directories_extracted += 1;
    }

    let leaves: Vec<&PlannedEntry> = plan
        .iter()
        .filter(|e| e.kind != PlannedKind::Directory)
        .collect();
    let written = write_leaves(&mut zip, archive, &leaves, options)?;
    for (entry, bytes) in leaves.iter().zip(&written) {
        match entry.kind {
            PlannedKind::Symlink => result.symlinks_extracted += 1,
            _ => result.files_extracted += 1,
        }
        result.bytes_extracted += bytes;
    }

    if options.preserve_metadata {
        let mut dirs: Vec<&PlannedEntry> = plan
            .iter()
            .filter(|e| e.kind == PlannedKind::Directory)
            .collect();
        dirs.sort_by_key(|e| std::cmp::Reverse(e.name.depth()));
        for entry in dirs {
            apply_metadata(entry);
        }
    }

    log::debug!(
        "Extracted {} entries ({} bytes) from '{}' to '{}'",
        result.entries_extracted(),
        result.bytes_extracted,
        archive.display(),
        dest.display()
    );
    Ok(result)
}

fn plan_entries(zip: &mut ArchiveReader, archive: &Path, dest: &Path) -> Result<Vec<PlannedEntry>> {
    let mut plan = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let file = zip.by_index_raw(index).map_err(|e| Error::from_zip(archive, e))?;
        let raw_name = file.name().to_string();
        let target = validate_extract_path(&raw_name, dest, index)?;
        let name = ArchivePath::new(&raw_name).map_err(|_| Error::PathTraversal {
            entry_index: index,
            path: raw_name.clone(),
        })?;

        let mode = file.unix_mode();
        let kind = if file.is_dir() {
            PlannedKind::Directory
        } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            PlannedKind::Symlink
        } else {
            PlannedKind::File
        };
        let modified: Option<zip::DateTime> = file.last_modified().into();

        plan.push(PlannedEntry {
            index,
            name,
            target,
            kind,
            mode: mode.map(|m| m & 0o7777),
            modified: modified.map(|dt| Timestamp::from_zip_datetime(&dt)),
        });
    }
    Ok(plan)
}

#[cfg(feature = "parallel")]
fn write_leaves(
    zip: &mut ArchiveReader,
    archive: &Path,
    leaves: &[&PlannedEntry],
    options: &ExtractOptions,
) -> Result<Vec<u64>> {
    use rayon::prelude::*;

    let threads = options.threads.count();
    if threads <= 1 || leaves.len() <= 1 {
        return leaves
            .iter()
            .map(|entry| write_leaf(zip, archive, entry, options))
            .collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Io(io::Error::other(e)))?;

    pool.install(|| {
        leaves
            .par_iter()
            .map_init(
                || open_archive(archive),
                |worker, entry| match worker {
                    Ok(zip) => write_leaf(zip, archive, entry, options),
                    Err(e) => Err(Error::Io(io::Error::other(e.to_string()))),
                },
            )
            .collect()
    })
}

#[cfg(not(feature = "parallel"))]
fn write_leaves(
    zip: &mut ArchiveReader,
    archive: &Path,
    leaves: &[&PlannedEntry],
    options: &ExtractOptions,
) -> Result<Vec<u64>> {
    leaves
        .iter()
        .map(|entry| write_leaf(zip, archive, entry, options))
        .collect()
}

/// Writes one file or link entry and returns the number of bytes written.
fn write_leaf<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    archive: &Path,
    entry: &PlannedEntry,
    options: &ExtractOptions,
) -> Result<u64> {
    let mut file = zip
        .by_index(entry.index)
        .map_err(|e| Error::from_zip(archive, e))?;

    if let Some(parent) = entry.target.parent() {
        fs::create_dir_all(parent)?;
    }
    remove_existing_non_dir(&entry.target)?;

    if entry.kind == PlannedKind::Symlink {
        let mut link_target = String::new();
        file.read_to_string(&mut link_target)
            .map_err(|e| read_error(archive, &entry.name, e))?;
        validate_link_target(&entry.name, &link_target, entry.index)?;
        create_symlink(&link_target, &entry.target)?;
        return Ok(0);
    }

    let mut out = File::create(&entry.target)?;
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| read_error(archive, &entry.name, e))?;
        if n == 0 {
            break;
        }
        io::Write::write_all(&mut out, &buf[..n])?;
        written += n as u64;
    }
    drop(out);

    if options.preserve_metadata {
        apply_metadata(entry);
    }
    Ok(written)
}

fn read_error(archive: &Path, name: &ArchivePath, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => Error::corrupt_archive(
            archive.display().to_string(),
            format!("entry '{}': {}", name, err),
        ),
        _ => Error::Io(err),
    }
}

/// Clears a file or link occupying `path` so the entry can replace it.
fn remove_existing_non_dir(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' is a directory", path.display()),
        ))),
        Ok(_) => Ok(fs::remove_file(path)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(unix)]
fn create_symlink(target: &str, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(target: &str, path: &Path) -> Result<()> {
    log::warn!(
        "Symbolic links are not supported here; writing '{}' as a file",
        path.display()
    );
    fs::write(path, target)?;
    Ok(())
}

/// Restores permissions and modification time. Failures are logged, not fatal.
fn apply_metadata(entry: &PlannedEntry) {
    #[cfg(unix)]
    if let Some(mode) = entry.mode {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&entry.target, fs::Permissions::from_mode(mode)) {
            log::warn!(
                "Failed to set permissions on '{}': {}",
                entry.target.display(),
                e
            );
        }
    }

    if let Some(modified) = entry.modified {
        if let Err(e) = filetime::set_file_mtime(&entry.target, modified.as_filetime()) {
            log::warn!(
                "Failed to set modification time on '{}': {}",
                entry.target.display(),
                e
            );
        }
    }
}
