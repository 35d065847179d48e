//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The library file exists but is not a valid mapping. Fatal: the caller
    /// has to decide whether to rebuild it, silently starting from an empty
    /// library would re-query the catalog for everything.
    #[display("corrupt hash library: {}", _0.display())]
    Corrupt(#[error(not(source))] PathBuf),
    /// The library file exists but could not be read.
    #[display("could not read hash library: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The library could not be written; the previous file (if any) is intact.
    #[display("could not write hash library: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Write(_))
    }
}
