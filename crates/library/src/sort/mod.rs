//! Placing classified ROMs into the output tree.
//!
//! ```text
//! <output>/
//! ├── with_achievements/
//! ├── without_achievements/
//! └── duplicates/
//!     ├── with_achievements/
//!     └── without_achievements/
//! ```
//!
//! ROMs that could not be classified land in `without_achievements`. Name
//! collisions are resolved without ever overwriting a file: an identical
//! occupant means the ROM is already there, a different occupant pushes the
//! incoming ROM to a ` (n)`-suffixed name.
//!
//! With deduplication enabled, a ROM whose content hash matches an earlier
//! ROM of the same run goes under `duplicates/` instead (see [`dedupe`]).

mod conflict;
pub mod dedupe;

use self::conflict::{Destination, resolve};
use self::dedupe::duplicate_target;
use crate::error::{ErrorKind, Result};
use crate::outcome::{ClassifiedRom, Failure, FailureKind, Outcome};
use exn::ResultExt;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const WITH_ACHIEVEMENTS_DIR: &str = "with_achievements";
pub const WITHOUT_ACHIEVEMENTS_DIR: &str = "without_achievements";
pub const DUPLICATES_DIR: &str = "duplicates";

/// Whether the original file stays where it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transfer {
    #[default]
    Copy,
    Move,
}

/// What happened to a single ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Copied(PathBuf),
    Moved(PathBuf),
    /// An identical file was already at the destination. When moving, the
    /// source has been removed.
    AlreadyPresent(PathBuf),
    /// Same content hash as `original`, an earlier ROM of the run; put under
    /// `duplicates/` at `target`.
    SetAside { original: PathBuf, target: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    pub result: std::result::Result<Action, Failure>,
}

impl Placement {
    pub fn failure(&self) -> Option<&Failure> {
        self.result.as_ref().err()
    }
}

pub struct Sorter {
    output: PathBuf,
    transfer: Transfer,
    dedupe: bool,
}

impl Sorter {
    pub fn new(output: impl Into<PathBuf>, transfer: Transfer) -> Self {
        Self { output: output.into(), transfer, dedupe: false }
    }

    /// Set aside ROMs whose content hash was already placed during the run.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn directory_for(&self, outcome: &Outcome) -> PathBuf {
        self.output.join(category(outcome))
    }

    pub fn duplicates_directory_for(&self, outcome: &Outcome) -> PathBuf {
        self.output.join(DUPLICATES_DIR).join(category(outcome))
    }

    /// Creates both output directories.
    pub fn prepare(&self) -> Result<()> {
        for dir in [WITH_ACHIEVEMENTS_DIR, WITHOUT_ACHIEVEMENTS_DIR].map(|name| self.output.join(name)) {
            fs::create_dir_all(&dir).or_raise(|| ErrorKind::Output(dir.clone()))?;
        }
        Ok(())
    }

    /// Places every ROM. Failing to place one ROM doesn't stop the others;
    /// only an output tree that can't be created is fatal.
    #[instrument(skip_all, fields(output = %self.output.display(), roms = roms.len()))]
    pub fn sort(&self, roms: &[ClassifiedRom]) -> Result<Vec<Placement>> {
        self.prepare()?;
        let mut seen: HashMap<&str, &Path> = HashMap::new();
        let placements: Vec<Placement> = roms
            .iter()
            .map(|rom| {
                if self.dedupe
                    && let Some(hash) = rom.hash.as_deref()
                {
                    match seen.entry(hash) {
                        Entry::Occupied(entry) => return self.set_aside(rom, entry.get()),
                        Entry::Vacant(entry) => {
                            entry.insert(&rom.path);
                        },
                    }
                }
                self.place(rom)
            })
            .collect();
        let failed = placements.iter().filter(|placement| placement.result.is_err()).count();
        tracing::info!(placed = placements.len() - failed, failed, "Sorted ROMs");
        Ok(placements)
    }

    pub fn place(&self, rom: &ClassifiedRom) -> Placement {
        let dir = self.directory_for(&rom.outcome);
        let result = self.transfer_into(&rom.path, &dir).map_err(|err| {
            tracing::warn!(path = %rom.path.display(), error = %err, "Could not place ROM");
            Failure::new(FailureKind::Placement, format!("could not place into {}: {err}", dir.display()))
        });
        if let Ok(action) = &result {
            tracing::debug!(path = %rom.path.display(), ?action, "Placed ROM");
        }
        Placement { source: rom.path.clone(), result }
    }

    /// Puts `rom`, a content duplicate of `original`, under `duplicates/`.
    pub fn set_aside(&self, rom: &ClassifiedRom, original: &Path) -> Placement {
        let dir = self.duplicates_directory_for(&rom.outcome);
        let result = fs::create_dir_all(&dir)
            .and_then(|()| duplicate_target(&dir, &rom.path))
            .and_then(|target| {
                match self.transfer {
                    Transfer::Copy => fs::copy(&rom.path, &target).map(|_| ()),
                    Transfer::Move => move_file(&rom.path, &target),
                }?;
                Ok(Action::SetAside { original: original.to_path_buf(), target })
            })
            .map_err(|err| {
                tracing::warn!(path = %rom.path.display(), error = %err, "Could not set aside duplicate ROM");
                Failure::new(FailureKind::Placement, format!("could not set aside into {}: {err}", dir.display()))
            });
        if let Ok(action) = &result {
            tracing::info!(path = %rom.path.display(), original = %original.display(), ?action, "Set aside duplicate ROM");
        }
        Placement { source: rom.path.clone(), result }
    }

    fn transfer_into(&self, source: &Path, dir: &Path) -> io::Result<Action> {
        match resolve(dir, source)? {
            Destination::Duplicate(existing) => {
                if self.transfer == Transfer::Move && !same_file(source, &existing)? {
                    fs::remove_file(source)?;
                }
                Ok(Action::AlreadyPresent(existing))
            },
            Destination::Free(target) => match self.transfer {
                Transfer::Copy => {
                    fs::copy(source, &target)?;
                    Ok(Action::Copied(target))
                },
                Transfer::Move => {
                    move_file(source, &target)?;
                    Ok(Action::Moved(target))
                },
            },
        }
    }
}

fn category(outcome: &Outcome) -> &'static str {
    if outcome.has_achievements() { WITH_ACHIEVEMENTS_DIR } else { WITHOUT_ACHIEVEMENTS_DIR }
}

/// Rename, falling back to copy-and-delete across filesystems.
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    fs::copy(source, target)?;
    fs::remove_file(source)
}

fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}
