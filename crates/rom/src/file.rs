//! ROM files as they move from "found on disk" to "content hash known".

use crate::System;
use crate::error::{ErrorKind, Result};
use md5::{Digest, Md5};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Length of a hex-encoded content hash.
pub const HASH_LENGTH: usize = 32;

/// Computes the catalog content hash of raw ROM bytes.
///
/// RetroAchievements identifies GBA dumps by the MD5 of the entire file, with
/// no header stripped. The result is lowercase hex.
#[must_use]
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> String {
    format!("{:x}", Md5::digest(bytes.as_ref()))
}

/// Path and size of a ROM file, independent of whether it has been hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomMeta {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}
impl RomMeta {
    /// The file name, falling back to the full path for odd inputs like `/`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

mod sealed {
    pub trait Sealed {}
}
pub trait HashState: sealed::Sealed {
    type Hash;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered;
impl sealed::Sealed for Discovered {}
impl HashState for Discovered {
    type Hash = ();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashed;
impl sealed::Sealed for Hashed {}
impl HashState for Hashed {
    type Hash = String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomFile<S: HashState = Discovered> {
    meta: RomMeta,
    pub hash: S::Hash,
}
impl<S: HashState> Deref for RomFile<S> {
    type Target = RomMeta;
    fn deref(&self) -> &RomMeta {
        &self.meta
    }
}

impl RomFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        RomMeta { path: path.into(), size }.into()
    }

    /// Stat a file on disk without reading its contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| ErrorKind::read(path, e))?;
        Ok(Self::new(path, metadata.len()))
    }

    /// Reads the file once and computes its content hash.
    ///
    /// Fails with [`ErrorKind::Read`] if the file cannot be read, and with
    /// [`ErrorKind::Empty`] or [`ErrorKind::TooSmall`] if it cannot be a ROM
    /// for `system`. The recorded size is taken from the bytes actually read.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn hash(self, system: System) -> Result<RomFile<Hashed>> {
        let bytes = std::fs::read(&self.path).map_err(|e| ErrorKind::read(&self.path, e))?;
        let size = bytes.len() as u64;
        if size == 0 {
            exn::bail!(ErrorKind::Empty(self.meta.path));
        }
        if size < system.min_rom_size() {
            exn::bail!(ErrorKind::TooSmall {
                path: self.meta.path,
                size,
                minimum: system.min_rom_size(),
            });
        }
        let hash = hash_bytes(&bytes);
        tracing::debug!(%hash, size, "Hashed ROM");
        let meta = RomMeta { size, ..self.meta };
        Ok(RomFile { meta, hash })
    }
}
impl From<RomMeta> for RomFile<Discovered> {
    fn from(meta: RomMeta) -> Self {
        Self { meta, hash: () }
    }
}

/// Convenience for [`RomFile::open`] followed by [`RomFile::hash`].
pub fn hash_file(path: impl AsRef<Path>, system: System) -> Result<RomFile<Hashed>> {
    RomFile::open(path)?.hash(system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"", "d41d8cd98f00b204e9800998ecf8427e")]
    #[case(b"abc", "900150983cd24fb0d6963f7d28e17f72")]
    #[case(b"The quick brown fox jumps over the lazy dog", "9e107d9d372bb6826bd81d3542a419d6")]
    fn test_hash_bytes(#[case] input: &[u8], #[case] expected: &str) {
        let hash = hash_bytes(input);
        assert_eq!(hash, expected);
        assert_eq!(hash.len(), HASH_LENGTH);
    }

    #[test]
    fn test_hash_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("game.gba");
        let contents = vec![0xAB_u8; 0x200];
        std::fs::write(&path, &contents).unwrap();
        let rom = hash_file(&path, System::GameBoyAdvance).unwrap();
        assert_eq!(rom.hash, hash_bytes(&contents));
        assert_eq!(rom.size, 0x200);
        assert_eq!(rom.file_name(), "game.gba");
    }

    #[test]
    fn test_hash_uses_bytes_read_not_stale_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("game.gba");
        let rom = RomFile::new(&path, 1);
        std::fs::write(&path, vec![1_u8; 0x100]).unwrap();
        let rom = rom.hash(System::GameBoyAdvance).unwrap();
        assert_eq!(rom.size, 0x100);
    }

    #[test]
    fn test_hashed_rom_is_debug_and_comparable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("game.gba");
        std::fs::write(&path, vec![7_u8; 0x100]).unwrap();
        let rom = hash_file(&path, System::GameBoyAdvance).unwrap();
        assert_eq!(rom.clone(), rom);
        assert!(format!("{rom:?}").contains("game.gba"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = hash_file(temp_dir.path().join("missing.gba"), System::GameBoyAdvance).unwrap_err();
        assert!(matches!(*err, ErrorKind::Read { .. }));
    }

    #[test]
    fn test_empty_file_is_format_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.gba");
        std::fs::write(&path, b"").unwrap();
        let err = hash_file(&path, System::GameBoyAdvance).unwrap_err();
        assert!(matches!(*err, ErrorKind::Empty(_)));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_undersized_file_is_format_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("tiny.gba");
        std::fs::write(&path, vec![0_u8; 0xBF]).unwrap();
        let err = hash_file(&path, System::GameBoyAdvance).unwrap_err();
        assert!(matches!(*err, ErrorKind::TooSmall { size: 0xBF, minimum: 0xC0, .. }));
    }
}
