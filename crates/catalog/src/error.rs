//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested game (or endpoint) does not exist upstream. Don't retry.
    #[display("not found in catalog: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The catalog asked us to slow down.
    #[display("rate limited by catalog")]
    RateLimited,
    /// Network failure or server-side error; the same request may succeed later.
    #[display("transient catalog error: {_0}")]
    Transient(#[error(not(source))] String),
    /// The credentials were rejected. Every further request would fail the
    /// same way, so callers should abort.
    #[display("catalog rejected the configured credentials")]
    Auth,
    /// The response could not be understood. Don't retry with the same request.
    #[display("invalid catalog response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// The HTTP client could not be constructed.
    #[display("could not initialize HTTP client")]
    Client,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient(_))
    }

    /// Returns `true` if continuing to talk to the catalog is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth | Self::Client)
    }
}
