//! Archive creation from enumerated tree entries.

use std::fs::{self, File};
use std::io::{self, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::options::CompressionLevel;
use crate::walk::{EntryKind, TreeEntry};
use crate::{Error, Result};

/// Counters for a finished compression.
#[must_use = "compression stats should be checked to verify the archive content"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressStats {
    /// Regular files written.
    pub files_written: usize,
    /// Directory entries written.
    pub directories_written: usize,
    /// Symbolic link entries written.
    pub symlinks_written: usize,
    /// Uncompressed bytes of file content written.
    pub bytes_written: u64,
}

impl CompressStats {
    /// Returns the total number of entries in the archive.
    pub fn entries_written(&self) -> usize {
        self.files_written + self.directories_written + self.symlinks_written
    }
}

/// Writes a new archive containing exactly `entries` to `writer`.
///
/// Root entries (empty relative path) are skipped; every other entry is
/// stored under its `/`-separated relative path with its captured
/// modification time and permissions. Returns the writer once the central
/// directory has been written.
///
/// # Errors
///
/// Returns [`Error::Io`] if a source node cannot be read or the archive
/// cannot be written.
pub fn compress<W: Write + Seek>(
    entries: &[TreeEntry],
    writer: W,
    level: CompressionLevel,
) -> Result<(W, CompressStats)> {
    let mut zip = ZipWriter::new(writer);
    let mut stats = CompressStats::default();

    for entry in entries.iter().filter(|e| !e.is_root()) {
        let name = entry.archive_path()?;
        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(level.get())))
            .last_modified_time(entry.metadata.modified.to_zip_datetime());
        if let Some(mode) = entry.metadata.mode {
            options = options.unix_permissions(mode);
        }

        match entry.metadata.kind {
            EntryKind::Directory => {
                zip.add_directory(name.directory_name(), options)
                    .map_err(write_error)?;
                stats.directories_written += 1;
            }
            EntryKind::File => {
                zip.start_file(name.as_str().to_string(), options)
                    .map_err(write_error)?;
                let mut source = File::open(&entry.path)?;
                stats.bytes_written += io::copy(&mut source, &mut zip)?;
                stats.files_written += 1;
            }
            EntryKind::Symlink => {
                let target = fs::read_link(&entry.path)?;
                let target = target.to_str().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("non UTF-8 link target: {}", entry.path.display()),
                    )
                })?;
                zip.add_symlink(name.as_str().to_string(), target.to_string(), options)
                    .map_err(write_error)?;
                stats.symlinks_written += 1;
            }
        }
    }

    let writer = zip.finish().map_err(write_error)?;
    log::debug!(
        "Compressed {} entries ({} bytes) at level {}",
        stats.entries_written(),
        stats.bytes_written,
        level.get()
    );
    Ok((writer, stats))
}

fn write_error(err: zip::result::ZipError) -> Error {
    match err {
        zip::result::ZipError::Io(e) => Error::Io(e),
        other => Error::Io(io::Error::other(other)),
    }
}
