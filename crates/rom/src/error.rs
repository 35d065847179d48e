//! ROM Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A ROM error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ROM operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file (or directory) could not be opened or read.
    #[display("could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: IoError },
    /// The file exists but contains no bytes.
    #[display("empty file: {}", _0.display())]
    Empty(#[error(not(source))] PathBuf),
    /// The file is smaller than the smallest plausible ROM for the system.
    #[display("file too small to be a ROM ({size} bytes, expected at least {minimum}): {}", path.display())]
    TooSmall { path: PathBuf, size: u64, minimum: u64 },
    /// The requested system is not one this tool knows how to hash.
    #[display("unsupported system: {_0}")]
    UnsupportedSystem(#[error(not(source))] String),
}
impl ErrorKind {
    pub(crate) fn read(path: impl AsRef<Path>, source: IoError) -> Self {
        Self::Read { path: path.as_ref().to_path_buf(), source }
    }

    /// Returns `true` when the file itself is unusable as a ROM (as opposed to
    /// being unreadable).
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Empty(_) | Self::TooSmall { .. })
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}
