//! Exit codes for the CLI tool.

use zipmerge::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format error
pub const BAD_ARCHIVE: i32 = 3;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    FatalError,
    BadArchive,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a zipmerge error to an exit code
///
/// A staging cleanup failure is classified by the failure that preceded it.
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error.primary() {
        Error::InvalidArgument { .. } => ExitCode::BadArgs,
        Error::InvalidCompressionLevel { .. } => ExitCode::BadArgs,
        Error::SourceNotFound { .. } => ExitCode::BadArgs,
        Error::SourceKindMismatch { .. } => ExitCode::BadArgs,
        Error::Io(_) => ExitCode::IoError,
        Error::CorruptArchive { .. } => ExitCode::BadArchive,
        Error::PathTraversal { .. } => ExitCode::FatalError,
        Error::StagingCleanup { .. } => ExitCode::IoError,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}
