//! Local hash library for ROM metadata.
//!
//! This crate provides the cache that maps ROM content hashes to what the
//! catalog knows about them (game id, title, achievement count). The cache is
//! not the source of truth - the catalog is. If the file is deleted, it can be
//! rebuilt by refreshing from the catalog.
//!
//! # Architecture
//! - **[`HashRecord`]**: the value stored per hash. Records are assembled from
//!   several partial catalog responses, so every field is optional and updates
//!   merge field-wise instead of replacing the record.
//! - **[`HashLibrary`]**: the in-memory mapping plus its backing JSON file.
//!   Persisting is atomic (temporary file + rename); loading a file that
//!   exists but does not parse is a hard error, never a silent reset.

pub mod error;
mod library;
mod record;

pub use crate::library::HashLibrary;
pub use crate::record::HashRecord;
