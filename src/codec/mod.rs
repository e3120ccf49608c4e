//! ZIP codec adapter.
//!
//! This module is the only place that talks to the ZIP container. It knows
//! nothing about merging:
//!
//! - [`compress`] writes a fresh archive containing exactly the given
//!   enumerated entries, Deflate-compressed at the requested level.
//! - [`extract`] writes every entry of an existing archive below a
//!   directory, preserving relative paths.
//!
//! Archive handles and output files are owned by scopes inside these
//! functions, so they are closed on every exit path.

mod compress;
mod extract;

pub use compress::{CompressStats, compress};
pub use extract::{ExtractResult, extract, list_entries};
