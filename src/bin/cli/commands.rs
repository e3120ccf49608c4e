//! Command implementations for the CLI tool.

use std::path::Path;

use zipmerge::{
    ArchiveUpdater, CommitMode, CompressionLevel, ExtractOptions, SourceKind, StagingRoot,
    Threads, UpdateOptions,
};

use crate::OutputFormat;
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::create_formatter;

/// Configuration for the add-file and add-dir commands.
pub struct UpdateConfig<'a> {
    pub kind: SourceKind,
    pub source: &'a Path,
    pub archive_path: &'a Path,
    pub level: i64,
    pub staging_root: Option<&'a Path>,
    pub atomic: bool,
    pub format: OutputFormat,
    pub quiet: bool,
    pub thread_count: usize,
}

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub output_dir: &'a Path,
    pub preserve_metadata: bool,
    pub format: OutputFormat,
    pub quiet: bool,
    pub thread_count: usize,
}

fn report(error: &zipmerge::Error) -> ExitCode {
    eprintln!("Error: {}", error);
    error_to_exit_code(error)
}

/// Update command implementation
pub fn update(config: &UpdateConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    let level = match CompressionLevel::from_i64(config.level) {
        Ok(level) => level,
        Err(e) => return report(&e),
    };

    let staging_root = match config.staging_root {
        Some(root) => StagingRoot::new(root),
        None => StagingRoot::default(),
    };
    let commit = if config.atomic {
        CommitMode::AtomicRename
    } else {
        CommitMode::Truncate
    };

    let options = UpdateOptions {
        level,
        staging_root,
        threads: Threads::count_or_auto(config.thread_count),
        commit,
        ..UpdateOptions::default()
    };
    let updater = ArchiveUpdater::new(options);

    let result = match config.kind {
        SourceKind::File => updater.update_with_file(config.source, config.archive_path),
        SourceKind::Directory => updater.update_with_directory(config.source, config.archive_path),
    };

    match result {
        Ok(result) => {
            if !config.quiet {
                print!(
                    "{}",
                    formatter.format_update_result(config.archive_path, &result)
                );
            }
            ExitCode::Success
        }
        Err(e) => report(&e),
    }
}

/// Extract command implementation
pub fn extract(config: &ExtractConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    let options = ExtractOptions::new()
        .threads(Threads::count_or_auto(config.thread_count))
        .preserve_metadata(config.preserve_metadata);

    match zipmerge::extract_with_options(config.archive_path, config.output_dir, &options) {
        Ok(result) => {
            if !config.quiet {
                print!("{}", formatter.format_extract_result(&result));
            }
            ExitCode::Success
        }
        Err(e) => report(&e),
    }
}

/// List command implementation
pub fn list(archive_path: &Path, format: OutputFormat) -> ExitCode {
    let formatter = create_formatter(format);

    match zipmerge::list_entries(archive_path) {
        Ok(names) => {
            print!("{}", formatter.format_list(&names));
            ExitCode::Success
        }
        Err(e) => report(&e),
    }
}
