//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only failures that end a whole run are errors here. Anything that concerns
//! a single ROM is recorded on that ROM's [`Outcome`](crate::Outcome) instead.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The hash library could not be written. Continuing would lose progress.
    #[display("hash library could not be updated")]
    Cache,
    /// The catalog rejected the credentials; every further request would fail.
    #[display("catalog refused further requests")]
    Catalog,
    /// The ROM directory could not be listed.
    #[display("could not list ROM directory")]
    Discover,
    #[display("could not prepare output directory {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    /// The report template failed to compile or render.
    #[display("could not render report")]
    Report,
    #[display("could not write report to {}", _0.display())]
    WriteReport(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache | Self::Output(_) | Self::WriteReport(_))
    }
}
