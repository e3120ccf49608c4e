//! Error types for archive update and extraction operations.
//!
//! This module provides the [`Error`] enum which represents every failure
//! mode of the crate, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! Every operation either completes or returns an error; there is no partial
//! success. When an update fails, the destination archive state is undefined
//! (see [`CommitMode`](crate::CommitMode) for how to avoid that).
//!
//! ```rust,no_run
//! use zipmerge::Error;
//!
//! fn add(source: &str, archive: &str) -> zipmerge::Result<()> {
//!     match zipmerge::update_with_file(source, archive, 6) {
//!         Ok(_) => Ok(()),
//!         Err(e) if e.is_invalid_argument() => {
//!             eprintln!("bad arguments: {}", e);
//!             Err(e)
//!         }
//!         Err(Error::CorruptArchive { path, reason }) => {
//!             eprintln!("{} is not a readable ZIP archive: {}", path, reason);
//!             Err(Error::CorruptArchive { path, reason })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```

use std::io;

/// The kind of source an update expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

impl std::fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "regular file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Helper struct for formatting StagingCleanup error messages.
struct StagingCleanupDisplay<'a> {
    path: &'a str,
    source: &'a io::Error,
    primary: Option<&'a Error>,
}

impl std::fmt::Display for StagingCleanupDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to remove staging directory '{}': {}",
            self.path, self.source
        )?;
        if let Some(primary) = self.primary {
            write!(f, " (after: {})", primary)?;
        }
        Ok(())
    }
}

/// The main error type for archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Arguments | [`InvalidArgument`][Self::InvalidArgument], [`InvalidCompressionLevel`][Self::InvalidCompressionLevel], [`SourceNotFound`][Self::SourceNotFound], [`SourceKindMismatch`][Self::SourceKindMismatch] | Caller mistakes, checked before any filesystem mutation |
/// | I/O | [`Io`][Self::Io], [`StagingCleanup`][Self::StagingCleanup] | File system operations |
/// | Format | [`CorruptArchive`][Self::CorruptArchive], [`PathTraversal`][Self::PathTraversal] | Malformed or hostile archives |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required argument was empty or otherwise malformed.
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// The argument name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The compression level is outside 1-9.
    ///
    /// ```rust
    /// use zipmerge::{CompressionLevel, Error};
    ///
    /// let result = CompressionLevel::new(10);
    /// assert!(matches!(result, Err(Error::InvalidCompressionLevel { level: 10 })));
    /// ```
    #[error("invalid compression level {level}: must be 1-9")]
    InvalidCompressionLevel {
        /// The invalid level that was provided.
        level: i64,
    },

    /// The source path does not exist.
    #[error("No such file or directory: {path}")]
    SourceNotFound {
        /// The missing source path.
        path: String,
    },

    /// The source exists but is not the kind the operation expects.
    #[error("Source '{path}' is not a {expected}")]
    SourceKindMismatch {
        /// The source path.
        path: String,
        /// What the operation expected to find.
        expected: ExpectedKind,
    },

    /// An I/O error occurred during file operations.
    ///
    /// Covers directory creation, file open, copy and removal failures, as
    /// well as write errors while compressing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive cannot be opened or read as a ZIP container.
    #[error("Corrupt archive '{path}': {reason}")]
    CorruptArchive {
        /// The archive path.
        path: String,
        /// A description of the problem.
        reason: String,
    },

    /// An archive entry would be written outside the extraction directory.
    #[error("Path traversal detected in entry {entry_index}: {path}")]
    PathTraversal {
        /// The entry index with path traversal.
        entry_index: usize,
        /// The offending entry name or link target.
        path: String,
    },

    /// The staging directory could not be removed.
    ///
    /// When the operation had already failed, the original failure is kept
    /// in `primary` so it is never masked by the cleanup failure.
    #[error("{}", StagingCleanupDisplay { path, source, primary: primary.as_deref() })]
    StagingCleanup {
        /// The staging directory that was left behind.
        path: String,
        /// The removal failure.
        #[source]
        source: io::Error,
        /// The failure that preceded cleanup, if any.
        primary: Option<Box<Error>>,
    },
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates an [`Error::InvalidArgument`].
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::CorruptArchive`].
    pub fn corrupt_archive(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error was raised by argument validation.
    ///
    /// These errors are always reported before any filesystem mutation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::InvalidCompressionLevel { .. }
                | Self::SourceNotFound { .. }
                | Self::SourceKindMismatch { .. }
        )
    }

    /// Returns true if the error indicates a malformed or hostile archive.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptArchive { .. } | Self::PathTraversal { .. })
    }

    /// Returns the failure that caused the operation to abort.
    ///
    /// For [`Error::StagingCleanup`] with an attached primary error this is
    /// the primary error; otherwise it is `self`.
    pub fn primary(&self) -> &Error {
        match self {
            Self::StagingCleanup {
                primary: Some(primary),
                ..
            } => primary.primary(),
            other => other,
        }
    }

    pub(crate) fn from_zip(path: &std::path::Path, err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::corrupt_archive(path.display().to_string(), other.to_string()),
        }
    }
}
