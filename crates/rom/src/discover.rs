use crate::System;
use crate::error::{ErrorKind, Result};
use crate::file::RomFile;
use std::fs;
use std::path::Path;
use tracing::instrument;

/// Lists the ROM files for `system` directly inside `dir`.
///
/// Only regular files (following symlinks) whose extension matches the
/// system are returned; subdirectories are not descended into. The result is
/// sorted by file name so that processing order is the same on every run and
/// every platform.
#[instrument(skip_all, fields(dir = %dir.as_ref().display(), %system))]
pub fn discover(dir: impl AsRef<Path>, system: System) -> Result<Vec<RomFile>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| ErrorKind::read(dir, e))?;
    let mut roms = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ErrorKind::read(dir, e))?.path();
        if !system.matches_extension(&path) {
            continue;
        }
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            // Note: silently drop what is most likely a broken symlink.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => exn::bail!(ErrorKind::read(&path, err)),
        };
        if metadata.is_file() {
            roms.push(RomFile::new(path, metadata.len()));
        }
    }
    roms.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    tracing::debug!(count = roms.len(), "Discovered ROM files");
    Ok(roms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_discover_filters_and_sorts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.gba"), b"data").unwrap();
        fs::write(root.join("A.GBA"), b"data").unwrap();
        fs::write(root.join("c.gb"), b"data").unwrap();
        fs::write(root.join("readme.txt"), b"data").unwrap();
        fs::create_dir(root.join("nested.gba")).unwrap();
        fs::write(root.join("nested.gba").join("d.gba"), b"data").unwrap();

        let roms = discover(root, System::GameBoyAdvance).unwrap();
        let names: Vec<_> = roms.iter().map(|rom| rom.file_name()).collect();
        assert_eq!(names, vec!["A.GBA", "b.gba"]);
        assert_eq!(roms[1].path, root.join("b.gba"));
        assert_eq!(roms[1].size, 4);
    }

    #[test]
    fn test_discover_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(discover(temp_dir.path(), System::GameBoyAdvance).unwrap().is_empty());
    }

    #[test]
    fn test_discover_missing_directory() {
        let err = discover(PathBuf::from("/definitely/not/a/real/dir"), System::GameBoyAdvance).unwrap_err();
        assert!(matches!(*err, ErrorKind::Read { .. }));
    }
}
