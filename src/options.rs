//! Options and configuration for update and extraction operations.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::staging::StagingRoot;
use crate::{Error, Result};

/// Sidecar file names removed by the hygiene filter by default.
pub const DEFAULT_SIDECAR_NAMES: &[&str] = &[".DS_Store"];

/// A Deflate compression level in the range 1-9.
///
/// Following zlib, 1 favors speed and 9 favors ratio. Level 0 (store) is
/// deliberately not accepted.
///
/// # Example
///
/// ```rust
/// use zipmerge::CompressionLevel;
///
/// let level = CompressionLevel::new(9).unwrap();
/// assert_eq!(level.get(), 9);
///
/// assert!(CompressionLevel::new(0).is_err());
/// assert!(CompressionLevel::new(10).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Fastest compression.
    pub const FASTEST: Self = Self(1);
    /// Balanced default.
    pub const DEFAULT: Self = Self(6);
    /// Best compression ratio.
    pub const BEST: Self = Self(9);

    /// Creates a level, rejecting values outside 1-9.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCompressionLevel`] if `level` is 0 or greater than 9.
    pub fn new(level: u32) -> Result<Self> {
        Self::from_i64(i64::from(level))
    }

    /// Creates a level from a signed integer as received across a process
    /// boundary, rejecting negative values the same way as out-of-range ones.
    pub fn from_i64(level: i64) -> Result<Self> {
        match u8::try_from(level) {
            Ok(value @ 1..=9) => Ok(Self(value)),
            _ => Err(Error::InvalidCompressionLevel { level }),
        }
    }

    /// Returns the numeric level.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0 as u32
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for CompressionLevel {
    type Error = Error;

    fn try_from(level: u32) -> Result<Self> {
        Self::new(level)
    }
}

/// Thread count configuration for the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threads {
    /// Use all available CPUs.
    #[default]
    Auto,
    /// Use a specific number of threads.
    Count(NonZeroUsize),
    /// Single-threaded operation.
    Single,
}

impl Threads {
    /// Creates a `Threads::Count` variant from a `usize`, where zero means
    /// [`Threads::Auto`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use zipmerge::Threads;
    ///
    /// assert_eq!(Threads::count_or_auto(0), Threads::Auto);
    /// assert_eq!(Threads::count_or_auto(4).count(), 4);
    /// ```
    pub fn count_or_auto(n: usize) -> Self {
        match NonZeroUsize::new(n) {
            Some(count) => Self::Count(count),
            None => Self::Auto,
        }
    }

    /// Returns the actual thread count (always at least 1).
    pub fn count(&self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Count(n) => n.get(),
            Self::Single => 1,
        }
    }
}

/// How the destination archive is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Create or truncate the destination, then compress straight into it.
    ///
    /// A failure while compressing leaves the destination empty or partially
    /// written, and concurrent readers may observe the truncated file.
    #[default]
    Truncate,
    /// Compress into a temporary file next to the destination and rename it
    /// into place only after compression succeeds.
    AtomicRename,
}

/// Options for merging content into an archive.
///
/// # Example
///
/// ```rust
/// use zipmerge::{CommitMode, CompressionLevel, UpdateOptions};
///
/// let options = UpdateOptions::new()
///     .level(CompressionLevel::BEST)
///     .staging_root("/var/tmp/zipmerge")
///     .commit(CommitMode::AtomicRename);
/// assert_eq!(options.level.get(), 9);
/// ```
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Deflate level for the rewritten archive.
    pub level: CompressionLevel,
    /// Root under which unique staging directories are derived.
    pub staging_root: StagingRoot,
    /// Explicit staging directory, overriding derivation from `staging_root`.
    pub staging_dir: Option<PathBuf>,
    /// Thread count for extracting the prior archive.
    pub threads: Threads,
    /// How the destination is replaced.
    pub commit: CommitMode,
    /// File names stripped by the hygiene filter.
    pub sidecar_names: Vec<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::DEFAULT,
            staging_root: StagingRoot::default(),
            staging_dir: None,
            threads: Threads::Auto,
            commit: CommitMode::Truncate,
            sidecar_names: DEFAULT_SIDECAR_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UpdateOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression level.
    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the staging root directory.
    pub fn staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = StagingRoot::new(root);
        self
    }

    /// Uses an explicit staging directory instead of deriving one.
    ///
    /// The directory is created when needed and removed when the operation
    /// returns, so it must not hold anything the caller wants to keep.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Sets the extraction thread count.
    pub fn threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the commit mode.
    pub fn commit(mut self, commit: CommitMode) -> Self {
        self.commit = commit;
        self
    }

    /// Replaces the hygiene filter's sidecar name list.
    pub fn sidecar_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sidecar_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for extracting an archive.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Thread count for decompression.
    pub threads: Threads,
    /// Restore Unix permissions and modification times.
    pub preserve_metadata: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            threads: Threads::Auto,
            preserve_metadata: true,
        }
    }
}

impl ExtractOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread count.
    pub fn threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    /// Enables or disables metadata restoration.
    pub fn preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }
}
