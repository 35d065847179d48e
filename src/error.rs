//! CLI Error Types
//!
//! One category per step of a command, so the message tells the user which
//! step failed; the wrapped tree says why.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("hash library unavailable")]
    Cache,
    #[display("catalog client could not be created")]
    Catalog,
    #[display("could not find ROMs")]
    Discover,
    #[display("reconciliation aborted")]
    Reconcile,
    #[display("could not sort ROMs")]
    Sort,
    #[display("could not produce report")]
    Report,
    #[display("could not import {}", _0.display())]
    Import(#[error(not(source))] std::path::PathBuf),
    #[display("{_0} file(s) could not be hashed")]
    Hash(#[error(not(source))] usize),
}

impl ErrorKind {
    /// Returns `true` if running the command again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache | Self::Reconcile | Self::Sort | Self::Report)
    }
}
