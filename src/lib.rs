//! # zipmerge
//!
//! Merge files and directories into ZIP archives.
//!
//! An update rebuilds the destination archive so that it holds the union of
//! its previous entries and the new content. Entries whose relative path
//! also exists in the new content are overwritten; all other entries are
//! preserved byte for byte.
//!
//! ## Quick Start
//!
//! ### Adding a File
//!
//! ```rust,no_run
//! fn main() -> zipmerge::Result<()> {
//!     // Creates reports.zip if it does not exist yet
//!     let result = zipmerge::update_with_file("report.txt", "reports.zip", 6)?;
//!     println!("archive now holds {} entries", result.entries_written);
//!     Ok(())
//! }
//! ```
//!
//! ### Merging a Directory
//!
//! ```rust,no_run
//! fn main() -> zipmerge::Result<()> {
//!     // Entries present in both are taken from `assets/`
//!     zipmerge::update_with_directory("assets", "bundle.zip", 9)?;
//!     Ok(())
//! }
//! ```
//!
//! ### Extracting
//!
//! ```rust,no_run
//! fn main() -> zipmerge::Result<()> {
//!     let result = zipmerge::extract("bundle.zip", "./output")?;
//!     println!("{} files extracted", result.files_extracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Staging
//!
//! When the destination archive already exists, its contents are extracted
//! into a staging directory, the new content is merged over them, and the
//! staging directory is compressed into the destination. Staging
//! directories are derived under a configurable root (see [`StagingRoot`])
//! and are always removed before the operation returns.
//!
//! ## Durability
//!
//! By default the destination is truncated before the new archive is
//! written, so a failed update can leave it empty or partial. Use
//! [`CommitMode::AtomicRename`] with an [`ArchiveUpdater`] to write a
//! temporary file and rename it into place instead.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `parallel` | Yes | Multi-threaded extraction with Rayon |
//! | `cli` | No | Command-line interface tool |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`]. Argument problems are reported
//! before anything on disk is changed; see [`Error::is_invalid_argument`].
//!
//! ```rust,no_run
//! use zipmerge::Error;
//!
//! fn merge(dir: &str, archive: &str) -> zipmerge::Result<()> {
//!     match zipmerge::update_with_directory(dir, archive, 6) {
//!         Ok(_) => Ok(()),
//!         Err(Error::CorruptArchive { path, reason }) => {
//!             eprintln!("cannot read {}: {}", path, reason);
//!             Err(Error::CorruptArchive { path, reason })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive_path;
pub mod codec;
pub mod error;
pub mod hygiene;
pub mod options;
pub mod staging;
pub mod timestamp;
pub mod update;
pub mod walk;

pub use archive_path::ArchivePath;
pub use codec::{CompressStats, ExtractResult, list_entries};
pub use error::{Error, ExpectedKind, Result};
pub use hygiene::HygieneFilter;
pub use options::{CommitMode, CompressionLevel, ExtractOptions, Threads, UpdateOptions};
pub use staging::{HeldModes, STAGING_ROOT_ENV, StagingArea, StagingRoot};
pub use timestamp::Timestamp;
pub use update::{
    ArchiveUpdater, SourceKind, UpdateRequest, UpdateResult, extract, extract_with_options,
    update_with_directory, update_with_file,
};
