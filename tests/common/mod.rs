//! Shared test utilities for integration tests.
//!
//! Helpers here build source trees and ZIP archives on disk and read them
//! back into ordered maps, so tests can compare whole archive contents.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zipmerge::staging::is_staging_dir_name;
use zipmerge::{ArchiveUpdater, UpdateOptions};

/// Writes files below `root`, creating parent directories as needed.
///
/// # Example
///
/// ```ignore
/// write_tree(dir.path(), &[("a.txt", b"alpha"), ("docs/b.md", b"beta")]);
/// ```
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, data) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, data).expect("Failed to write file");
    }
}

/// Writes a ZIP archive containing the given files, without directory entries.
pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).expect("Failed to create archive");
    let mut zip = zip::ZipWriter::new(file);
    for (name, data) in files {
        zip.start_file(name.to_string(), SimpleFileOptions::default())
            .expect("Failed to start entry");
        zip.write_all(data).expect("Failed to write entry");
    }
    zip.finish().expect("Failed to finish archive");
}

/// Reads every file entry of an archive into a name-ordered map.
///
/// Directory entries are skipped.
pub fn read_zip(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive =
        zip::ZipArchive::new(File::open(path).expect("Failed to open archive"))
            .expect("Failed to read archive");
    let mut files = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("Failed to read entry");
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("Failed to decompress entry");
        files.insert(entry.name().to_string(), data);
    }
    files
}

/// Returns every entry name of an archive, sorted.
pub fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).expect("Failed to open archive"))
        .expect("Failed to read archive");
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    names
}

/// Reads every regular file below `root` into a map keyed by `/`-separated
/// relative path.
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry.expect("Failed to walk tree");
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .expect("Entry outside root")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative, fs::read(entry.path()).expect("Failed to read file"));
    }
    files
}

/// Converts `(name, data)` pairs into the map shape returned by [`read_zip`].
pub fn to_map(files: &[(&str, &[u8])]) -> BTreeMap<String, Vec<u8>> {
    files
        .iter()
        .map(|(name, data)| (name.to_string(), data.to_vec()))
        .collect()
}

/// Returns an updater whose staging directories live under `staging_root`.
pub fn isolated_updater(staging_root: &Path) -> ArchiveUpdater {
    ArchiveUpdater::new(UpdateOptions::new().staging_root(staging_root))
}

/// Lists staging directories left under a staging root. A missing root
/// counts as empty.
pub fn staging_leftovers(staging_root: &Path) -> Vec<PathBuf> {
    match fs::read_dir(staging_root) {
        Ok(entries) => entries
            .map(|e| e.expect("Failed to read staging root"))
            .filter(|e| is_staging_dir_name(&e.file_name()))
            .map(|e| e.path())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Returns the Unix permission bits stored for one archive entry.
pub fn zip_mode(path: &Path, name: &str) -> Option<u32> {
    let mut archive = zip::ZipArchive::new(File::open(path).expect("Failed to open archive"))
        .expect("Failed to read archive");
    let entry = archive.by_name(name).expect("Entry not found");
    entry.unix_mode().map(|mode| mode & 0o777)
}

/// Sets Unix permission bits on a path.
#[cfg(unix)]
pub fn chmod(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("Failed to set mode");
}
