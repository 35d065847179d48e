//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration file was named explicitly but does not exist.
    #[display("configuration file not found: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    #[display("unsupported configuration format (expected .toml, .yaml or .json): {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    #[display("could not read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The merged configuration doesn't fit the expected shape.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    #[display("missing catalog credentials: set RA_USERNAME and RA_API_KEY")]
    MissingCredentials,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}
