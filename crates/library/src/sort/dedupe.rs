//! Setting aside ROMs whose content is already present under another name.
//!
//! Duplicates are never deleted. They are moved (or copied, when sorting in
//! copy mode) under `<output>/duplicates/<category>/`, and a name already
//! taken there gets a `_dupN` suffix.

use super::{DUPLICATES_DIR, WITH_ACHIEVEMENTS_DIR, WITHOUT_ACHIEVEMENTS_DIR, move_file};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use rasort_rom::{System, discover};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Counters for one deduplicated folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeStats {
    pub scanned: usize,
    pub unique: usize,
    pub moved: usize,
    /// Files that could not be hashed; left where they are.
    pub unreadable: usize,
    /// Duplicates that could not be moved; left where they are.
    pub failed: usize,
}

impl DedupeStats {
    fn add(&mut self, other: &DedupeStats) {
        self.scanned += other.scanned;
        self.unique += other.unique;
        self.moved += other.moved;
        self.unreadable += other.unreadable;
        self.failed += other.failed;
    }
}

/// A free path for `source` inside `dir`: the original name, then
/// `name_dup1.ext`, `name_dup2.ext`, and so on.
pub(crate) fn duplicate_target(dir: &Path, source: &Path) -> io::Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
    let candidate = dir.join(file_name);
    if fs::symlink_metadata(&candidate).is_err() {
        return Ok(candidate);
    }
    let name = Path::new(file_name);
    let stem = name.file_stem().unwrap_or(file_name).to_string_lossy();
    let extension = name.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{stem}_dup{n}{extension}")))
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
        .ok_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "no free duplicate name"))
}

/// Moves every ROM in `folder` whose content hash was already seen (in file
/// name order) into `duplicates`.
#[instrument(skip_all, fields(folder = %folder.display()))]
pub fn dedupe_folder(folder: &Path, duplicates: &Path, system: System) -> Result<DedupeStats> {
    let mut stats = DedupeStats::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let roms = discover(folder, system).or_raise(|| ErrorKind::Discover)?;
    for rom in roms {
        stats.scanned += 1;
        let path = rom.path.clone();
        let hash = match rom.hash(system) {
            Ok(rom) => rom.hash,
            Err(err) => {
                let kind: &rasort_rom::error::ErrorKind = &err;
                tracing::warn!(path = %path.display(), error = %kind, "Skipping unreadable ROM");
                stats.unreadable += 1;
                continue;
            },
        };
        let original = match seen.entry(hash) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                entry.insert(path);
                stats.unique += 1;
                continue;
            },
        };
        let moved = fs::create_dir_all(duplicates)
            .and_then(|()| duplicate_target(duplicates, &path))
            .and_then(|target| move_file(&path, &target).map(|()| target));
        match moved {
            Ok(target) => {
                tracing::info!(
                    path = %path.display(),
                    original = %original.display(),
                    target = %target.display(),
                    "Moved duplicate ROM"
                );
                stats.moved += 1;
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Could not move duplicate ROM");
                stats.failed += 1;
            },
        }
    }
    Ok(stats)
}

/// Deduplicates both category folders of a sorted output tree.
///
/// Returns the counters per category folder that exists, followed by the
/// overall totals.
pub fn dedupe_output(output: &Path, system: System) -> Result<(Vec<(&'static str, DedupeStats)>, DedupeStats)> {
    let mut folders = Vec::new();
    let mut total = DedupeStats::default();
    for category in [WITH_ACHIEVEMENTS_DIR, WITHOUT_ACHIEVEMENTS_DIR] {
        let folder = output.join(category);
        if !folder.is_dir() {
            continue;
        }
        let stats = dedupe_folder(&folder, &output.join(DUPLICATES_DIR).join(category), system)?;
        total.add(&stats);
        folders.push((category, stats));
    }
    tracing::info!(moved = total.moved, scanned = total.scanned, "Deduplicated output");
    Ok((folders, total))
}
