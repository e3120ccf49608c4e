//! Archive update integration tests.

use std::fs;

use tempfile::TempDir;
use zipmerge::{
    ArchiveUpdater, CommitMode, CompressionLevel, Error, ExpectedKind, SourceKind,
    UpdateOptions, UpdateRequest,
};

mod common;

#[cfg(unix)]
use common::{chmod, zip_mode};
use common::{
    isolated_updater, read_zip, staging_leftovers, to_map, write_tree, write_zip, zip_names,
};

// =============================================================================
// Creating New Archives
// =============================================================================

#[test]
fn test_single_file_into_missing_destination() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("report.txt");
    fs::write(&source, b"Q3 revenue: up").unwrap();
    let dest = temp.path().join("reports.zip");

    let result = zipmerge::update_with_file(&source, &dest, 6).unwrap();

    assert!(!result.merged);
    assert_eq!(result.entries_written, 1);
    assert_eq!(zip_names(&dest), vec!["report.txt"]);
    assert_eq!(read_zip(&dest), to_map(&[("report.txt", b"Q3 revenue: up")]));
}

#[test]
fn test_directory_into_missing_destination() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("site");
    write_tree(
        &source,
        &[("index.html", b"<html>"), ("css/site.css", b"body{}")],
    );
    let dest = temp.path().join("site.zip");
    let staging = temp.path().join("staging");

    let result = isolated_updater(&staging)
        .update_with_directory(&source, &dest)
        .unwrap();

    assert!(!result.merged);
    assert_eq!(result.files_written, 2);
    assert_eq!(result.directories_written, 1);
    assert_eq!(zip_names(&dest), vec!["css/", "css/site.css", "index.html"]);
    assert!(!staging.exists(), "no staging area should be created");
}

// =============================================================================
// Merging Into Existing Archives
// =============================================================================

#[test]
fn test_directory_merge_overwrites_and_adds() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("bundle.zip");
    write_zip(&dest, &[("a.txt", b"alpha"), ("b.txt", b"old beta")]);

    let source = temp.path().join("src");
    write_tree(&source, &[("b.txt", b"new beta"), ("c.txt", b"gamma")]);
    let staging = temp.path().join("staging");

    let updater = ArchiveUpdater::new(
        UpdateOptions::new()
            .level(CompressionLevel::new(9).unwrap())
            .staging_root(&staging),
    );
    let result = updater.update_with_directory(&source, &dest).unwrap();

    assert!(result.merged);
    assert_eq!(
        read_zip(&dest),
        to_map(&[
            ("a.txt", b"alpha"),
            ("b.txt", b"new beta"),
            ("c.txt", b"gamma"),
        ])
    );
    assert!(staging_leftovers(&staging).is_empty());
}

#[test]
fn test_directory_merge_is_recursive() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("docs.zip");
    write_zip(
        &dest,
        &[
            ("docs/guide/intro.md", b"intro"),
            ("docs/guide/setup.md", b"old setup"),
        ],
    );

    let source = temp.path().join("src");
    write_tree(
        &source,
        &[
            ("docs/guide/setup.md", b"new setup"),
            ("docs/api/index.md", b"api"),
        ],
    );

    let _ = isolated_updater(&temp.path().join("staging"))
        .update_with_directory(&source, &dest)
        .unwrap();

    assert_eq!(
        read_zip(&dest),
        to_map(&[
            ("docs/api/index.md", b"api"),
            ("docs/guide/intro.md", b"intro"),
            ("docs/guide/setup.md", b"new setup"),
        ])
    );
}

#[test]
fn test_file_merge_keeps_other_entries() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("notes.zip");
    write_zip(&dest, &[("todo.txt", b"old"), ("sub/keep.txt", b"keep")]);

    let source = temp.path().join("todo.txt");
    fs::write(&source, b"new").unwrap();

    let result = isolated_updater(&temp.path().join("staging"))
        .update_with_file(&source, &dest)
        .unwrap();

    assert!(result.merged);
    assert_eq!(
        read_zip(&dest),
        to_map(&[("sub/keep.txt", b"keep"), ("todo.txt", b"new")])
    );
}

#[test]
fn test_file_merge_stores_basename_at_root() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.zip");
    write_zip(&dest, &[("existing.txt", b"x")]);

    let source = temp.path().join("deep/nested/leaf.txt");
    write_tree(temp.path(), &[("deep/nested/leaf.txt", b"leaf")]);

    let _ = isolated_updater(&temp.path().join("staging"))
        .update_with_file(&source, &dest)
        .unwrap();

    assert_eq!(
        read_zip(&dest),
        to_map(&[("existing.txt", b"x"), ("leaf.txt", b"leaf")])
    );
}

#[test]
fn test_merging_empty_directory_preserves_archive() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.zip");
    write_zip(&dest, &[("a.txt", b"a"), ("b/c.txt", b"c")]);
    let source = temp.path().join("empty");
    fs::create_dir(&source).unwrap();

    let _ = isolated_updater(&temp.path().join("staging"))
        .update_with_directory(&source, &dest)
        .unwrap();

    assert_eq!(read_zip(&dest), to_map(&[("a.txt", b"a"), ("b/c.txt", b"c")]));
}

// =============================================================================
// Hygiene Filter
// =============================================================================

#[test]
fn test_sidecar_files_are_not_archived() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    write_tree(&source, &[(".DS_Store", b"junk"), ("photo.jpg", b"jpeg")]);
    let dest = temp.path().join("photos.zip");

    let _ = isolated_updater(&temp.path().join("staging"))
        .update_with_directory(&source, &dest)
        .unwrap();

    assert_eq!(zip_names(&dest), vec!["photo.jpg"]);
    assert!(!source.join(".DS_Store").exists());
}

#[test]
fn test_sidecar_in_prior_archive_is_dropped_on_directory_merge() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("photos.zip");
    write_zip(&dest, &[(".DS_Store", b"junk"), ("old.jpg", b"old")]);
    let source = temp.path().join("src");
    write_tree(&source, &[("new.jpg", b"new")]);

    let _ = isolated_updater(&temp.path().join("staging"))
        .update_with_directory(&source, &dest)
        .unwrap();

    assert_eq!(zip_names(&dest), vec!["new.jpg", "old.jpg"]);
}

#[test]
fn test_custom_sidecar_names() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    write_tree(&source, &[("Thumbs.db", b"junk"), ("a.txt", b"a")]);
    let dest = temp.path().join("out.zip");

    let updater = ArchiveUpdater::new(
        UpdateOptions::new()
            .staging_root(temp.path().join("staging"))
            .sidecar_names(["Thumbs.db"]),
    );
    let _ = updater.update_with_directory(&source, &dest).unwrap();

    assert_eq!(zip_names(&dest), vec!["a.txt"]);
}

// =============================================================================
// Argument Validation
// =============================================================================

#[test]
fn test_invalid_levels_leave_destination_untouched() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("a.txt");
    fs::write(&source, b"a").unwrap();

    let missing = temp.path().join("missing.zip");
    let existing = temp.path().join("existing.zip");
    write_zip(&existing, &[("keep.txt", b"keep")]);
    let before = fs::read(&existing).unwrap();

    for level in [0, 10] {
        let err = zipmerge::update_with_file(&source, &missing, level).unwrap_err();
        assert!(matches!(err, Error::InvalidCompressionLevel { .. }));
        assert!(!missing.exists());

        let err = zipmerge::update_with_directory(temp.path(), &existing, level).unwrap_err();
        assert!(matches!(err, Error::InvalidCompressionLevel { .. }));
        assert_eq!(fs::read(&existing).unwrap(), before);
    }
}

#[test]
fn test_empty_paths_fail_before_mutation() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    write_tree(&source, &[(".DS_Store", b"junk"), ("a.txt", b"a")]);
    let dest = temp.path().join("out.zip");

    let err = zipmerge::update_with_file("", &dest, 6).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { name: "source", .. }));

    let err = zipmerge::update_with_directory(&source, "", 6).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { name: "destination", .. }));

    let staging = temp.path().join("staging");
    let request = UpdateRequest::new(SourceKind::Directory, &source, &dest, 6).staging_dir("");
    let err = isolated_updater(&staging).update(&request).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { name: "staging_dir", .. }));

    assert!(!dest.exists());
    assert!(!staging.exists());
    assert!(source.join(".DS_Store").exists(), "hygiene must not run");
}

#[test]
fn test_missing_source_is_reported() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.zip");

    let err = zipmerge::update_with_file(temp.path().join("nope.txt"), &dest, 6).unwrap_err();
    assert!(matches!(err, Error::SourceNotFound { .. }));
    assert!(err.is_invalid_argument());
    assert!(!dest.exists());
}

#[test]
fn test_source_kind_mismatch() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.txt");
    fs::write(&file, b"a").unwrap();
    let dest = temp.path().join("out.zip");

    let err = zipmerge::update_with_file(temp.path(), &dest, 6).unwrap_err();
    assert!(matches!(
        err,
        Error::SourceKindMismatch {
            expected: ExpectedKind::File,
            ..
        }
    ));

    let err = zipmerge::update_with_directory(&file, &dest, 6).unwrap_err();
    assert!(matches!(
        err,
        Error::SourceKindMismatch {
            expected: ExpectedKind::Directory,
            ..
        }
    ));
    assert!(!dest.exists());
}

// =============================================================================
// Staging Lifecycle
// =============================================================================

#[test]
fn test_no_staging_left_after_repeated_updates() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    let dest = temp.path().join("out.zip");
    let updater = isolated_updater(&staging);

    for i in 0..3 {
        let source = temp.path().join(format!("file{}.txt", i));
        fs::write(&source, format!("content {}", i)).unwrap();
        let _ = updater.update_with_file(&source, &dest).unwrap();
        assert!(staging_leftovers(&staging).is_empty());
    }

    assert_eq!(
        zip_names(&dest),
        vec!["file0.txt", "file1.txt", "file2.txt"]
    );
}

#[test]
fn test_corrupt_destination_fails_and_cleans_staging() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    let dest = temp.path().join("broken.zip");
    fs::write(&dest, b"definitely not a zip archive").unwrap();
    let source = temp.path().join("a.txt");
    fs::write(&source, b"a").unwrap();

    let err = isolated_updater(&staging)
        .update_with_file(&source, &dest)
        .unwrap_err();

    assert!(err.is_corruption(), "unexpected error: {:?}", err);
    assert!(staging_leftovers(&staging).is_empty());
    assert_eq!(fs::read(&dest).unwrap(), b"definitely not a zip archive");
}

#[test]
fn test_non_empty_explicit_staging_dir_is_refused() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.zip");
    write_zip(&dest, &[("a.txt", b"a")]);
    let source = temp.path().join("b.txt");
    fs::write(&source, b"b").unwrap();
    let staging = temp.path().join("busy");
    write_tree(&staging, &[("stale.txt", b"stale")]);

    let updater = ArchiveUpdater::new(UpdateOptions::new().staging_dir(&staging));
    let err = updater.update_with_file(&source, &dest).unwrap_err();

    assert!(err.is_invalid_argument());
    assert!(staging.join("stale.txt").exists());
    assert_eq!(zip_names(&dest), vec!["a.txt"]);
}

#[cfg(unix)]
#[test]
fn test_merge_failure_surfaces_primary_error_and_cleans_staging() {
    use std::os::unix::net::UnixListener;

    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    let dest = temp.path().join("out.zip");
    write_zip(&dest, &[("a.txt", b"a")]);
    let before = fs::read(&dest).unwrap();

    // A socket enumerates like a file but cannot be opened for copying.
    let source = temp.path().join("src");
    write_tree(&source, &[("b.txt", b"b")]);
    let _listener = UnixListener::bind(source.join("control.sock")).unwrap();

    let err = isolated_updater(&staging)
        .update_with_directory(&source, &dest)
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)), "unexpected error: {:?}", err);
    assert!(staging_leftovers(&staging).is_empty());
    assert_eq!(fs::read(&dest).unwrap(), before);
}

#[cfg(unix)]
#[test]
fn test_merge_into_archive_with_read_only_directory() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    let dest = temp.path().join("out.zip");
    let updater = isolated_updater(&staging);

    let first = temp.path().join("first");
    write_tree(&first, &[("ro/file.txt", b"file")]);
    chmod(&first.join("ro"), 0o555);
    let _ = updater.update_with_directory(&first, &dest).unwrap();
    assert_eq!(zip_mode(&dest, "ro/"), Some(0o555));

    let second = temp.path().join("second");
    write_tree(&second, &[("other.txt", b"other")]);
    let result = updater.update_with_directory(&second, &dest).unwrap();

    assert!(result.merged);
    assert!(staging_leftovers(&staging).is_empty());
    assert_eq!(zip_mode(&dest, "ro/"), Some(0o555));

    let third = temp.path().join("third");
    write_tree(&third, &[("ro/added.txt", b"added")]);
    chmod(&third.join("ro"), 0o555);
    let _ = updater.update_with_directory(&third, &dest).unwrap();

    assert!(staging_leftovers(&staging).is_empty());
    assert_eq!(
        read_zip(&dest),
        to_map(&[
            ("other.txt", b"other"),
            ("ro/added.txt", b"added"),
            ("ro/file.txt", b"file"),
        ])
    );
    assert_eq!(zip_mode(&dest, "ro/"), Some(0o555));

    chmod(&first.join("ro"), 0o755);
    chmod(&third.join("ro"), 0o755);
}

#[cfg(unix)]
#[test]
fn test_merged_directories_keep_source_mode() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.zip");
    let updater = isolated_updater(&temp.path().join("staging"));

    let first = temp.path().join("first");
    write_tree(&first, &[("priv/old.txt", b"old")]);
    chmod(&first.join("priv"), 0o755);
    let _ = updater.update_with_directory(&first, &dest).unwrap();

    let second = temp.path().join("second");
    write_tree(&second, &[("priv/new.txt", b"new"), ("fresh/x.txt", b"x")]);
    chmod(&second.join("priv"), 0o700);
    chmod(&second.join("fresh"), 0o750);
    let _ = updater.update_with_directory(&second, &dest).unwrap();

    assert_eq!(zip_mode(&dest, "priv/"), Some(0o700));
    assert_eq!(zip_mode(&dest, "fresh/"), Some(0o750));
    assert_eq!(
        read_zip(&dest),
        to_map(&[
            ("fresh/x.txt", b"x"),
            ("priv/new.txt", b"new"),
            ("priv/old.txt", b"old"),
        ])
    );
}

// =============================================================================
// Commit Modes
// =============================================================================

#[test]
fn test_atomic_commit_merges_like_truncate() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    fs::create_dir(&out).unwrap();
    let dest = out.join("bundle.zip");
    write_zip(&dest, &[("a.txt", b"alpha"), ("b.txt", b"old")]);
    let source = temp.path().join("src");
    write_tree(&source, &[("b.txt", b"new")]);

    let updater = ArchiveUpdater::new(
        UpdateOptions::new()
            .staging_root(temp.path().join("staging"))
            .commit(CommitMode::AtomicRename),
    );
    let result = updater.update_with_directory(&source, &dest).unwrap();

    assert!(result.merged);
    assert_eq!(read_zip(&dest), to_map(&[("a.txt", b"alpha"), ("b.txt", b"new")]));
    let names: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["bundle.zip"]);
}

#[test]
fn test_atomic_commit_leaves_corrupt_destination_untouched() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("broken.zip");
    fs::write(&dest, b"garbage").unwrap();
    let source = temp.path().join("a.txt");
    fs::write(&source, b"a").unwrap();

    let updater = ArchiveUpdater::new(
        UpdateOptions::new()
            .staging_root(temp.path().join("staging"))
            .commit(CommitMode::AtomicRename),
    );
    assert!(updater.update_with_file(&source, &dest).is_err());
    assert_eq!(fs::read(&dest).unwrap(), b"garbage");
}

#[cfg(unix)]
#[test]
fn test_atomic_commit_keeps_destination_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("shared.zip");
    write_zip(&dest, &[("a.txt", b"a")]);
    fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();
    let source = temp.path().join("b.txt");
    fs::write(&source, b"b").unwrap();

    let updater = ArchiveUpdater::new(
        UpdateOptions::new()
            .staging_root(temp.path().join("staging"))
            .commit(CommitMode::AtomicRename),
    );
    let _ = updater.update_with_file(&source, &dest).unwrap();

    let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
}
