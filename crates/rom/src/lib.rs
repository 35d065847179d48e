//! ROM discovery and content hashing.
//!
//! A ROM is identified by the catalog through a content hash computed over
//! the file bytes. This crate finds candidate files for a [`System`], reads
//! each one exactly once, rejects files that cannot possibly be ROMs, and
//! produces the hash in the exact form the catalog publishes it.

mod discover;
pub mod error;
pub mod file;
mod system;

pub use crate::discover::discover;
pub use crate::file::{HASH_LENGTH, RomFile, hash_bytes, hash_file};
pub use crate::system::System;
