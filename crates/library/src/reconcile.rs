//! The per-ROM state machine that turns a file into an [`Outcome`].
//!
//! ```text
//! Hashing ─► Lookup ─┬─► (hit) ──────────────────────────► Classified
//!                    ├─► (id only) ─► Fetching ─► Upserting ─► Classified
//!                    ├─► (miss) ─► Indexing ─► Lookup
//!                    └─► (miss, index consulted) ─────────► Errored
//! ```
//!
//! The index counts as consulted once the library records that the full game
//! list for the system was imported, in this run or an earlier one. Only the
//! `refresh` command updates it after that.
//!
//! Any state may also end in `Errored` for per-file problems. Problems that
//! would affect every following file (rejected credentials, a hash library
//! that can't be written) abort the run instead.

use crate::error::{ErrorKind, Result};
use crate::outcome::{ClassifiedRom, Failure, FailureKind, Outcome};
use crate::summary::Summary;
use exn::ResultExt;
use rasort_cache::{HashLibrary, HashRecord};
use rasort_catalog::{CatalogClient, CatalogHash};
use rasort_catalog::error::ErrorKind as CatalogErrorKind;
use rasort_rom::{System, hash_file};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::UtcDateTime;
use tracing::instrument;

/// Whether the bulk game list has been consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Index {
    NotFetched,
    Fetched,
    /// The bulk fetch failed; the reason is reported for every later miss.
    Unavailable(String),
}

#[derive(Debug)]
enum State {
    Hashing(PathBuf),
    Lookup(String),
    Indexing(String),
    Fetching { hash: String, game_id: u32 },
    Upserting { hash: String, record: HashRecord },
    Classified { title: Option<String>, achievements: u32 },
    Errored(Failure),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Hashing(_) => "hashing",
            Self::Lookup(_) => "lookup",
            Self::Indexing(_) => "indexing",
            Self::Fetching { .. } => "fetching",
            Self::Upserting { .. } => "upserting",
            Self::Classified { .. } => "classified",
            Self::Errored(_) => "errored",
        }
    }
}

/// Upsert a catalog game list into the library. Returns the number of
/// changed records.
pub fn import_catalog(library: &mut HashLibrary, entries: Vec<CatalogHash>) -> usize {
    library.import_game_list(entries.into_iter().map(|entry| {
        let record = HashRecord {
            game_id: Some(entry.game_id),
            title: Some(entry.title),
            achievements: entry.achievements,
        };
        (entry.hash, record)
    }))
}

/// Fetch the full game list for `system` into the library and persist it.
///
/// Returns the number of changed records.
#[instrument(skip_all, fields(%system, only_with_achievements))]
pub fn refresh(
    library: &mut HashLibrary,
    catalog: &CatalogClient,
    system: System,
    only_with_achievements: bool,
) -> Result<usize> {
    let entries = catalog.fetch_game_list(system, only_with_achievements).or_raise(|| ErrorKind::Catalog)?;
    let fetched = entries.len();
    let changed = import_catalog(library, entries);
    // A filtered list leaves out games without achievements, so it doesn't
    // settle whether a missing hash is unknown.
    if !only_with_achievements {
        library.mark_indexed(system.id());
    }
    if library.is_dirty() {
        library.persist().or_raise(|| ErrorKind::Cache)?;
    }
    tracing::info!(fetched, changed, hashes = library.len(), "Refreshed hash library");
    Ok(changed)
}

/// Where a state machine run ended up.
struct Resolution {
    hash: Option<String>,
    title: Option<String>,
    outcome: Outcome,
}

/// Every ROM of one run, in input order, plus the counters for the report.
#[derive(Debug, Clone)]
pub struct Run {
    pub roms: Vec<ClassifiedRom>,
    pub summary: Summary,
}

/// Classifies ROMs using the hash library first and the catalog second.
///
/// New knowledge from the catalog is written into the library and persisted
/// before the next ROM is looked at, so a run that dies halfway keeps
/// everything it learned. Processing is strictly sequential and in input
/// order; a later ROM with the same content as an earlier one is answered
/// from the library, or from the failure the earlier one ran into, without
/// another request.
pub struct Reconciler<'a> {
    library: &'a mut HashLibrary,
    catalog: &'a CatalogClient,
    system: System,
    refresh_on_miss: bool,
    index: Index,
    /// Hashes whose game lookup failed during this run.
    failed: HashMap<String, Failure>,
}

impl<'a> Reconciler<'a> {
    pub fn new(library: &'a mut HashLibrary, catalog: &'a CatalogClient, system: System) -> Self {
        let index = if library.is_indexed(system.id()) { Index::Fetched } else { Index::NotFetched };
        Self {
            library,
            catalog,
            system,
            refresh_on_miss: true,
            index,
            failed: HashMap::new(),
        }
    }

    /// Whether a hash missing from the library triggers one bulk game list
    /// fetch for the run. When disabled, such hashes are unknown ROMs.
    pub fn with_refresh_on_miss(mut self, enabled: bool) -> Self {
        self.refresh_on_miss = enabled;
        self
    }

    /// Reconcile every path in order.
    ///
    /// Per-file problems are recorded on the returned ROMs; only fatal errors
    /// stop the run early.
    #[instrument(skip_all, fields(system = %self.system))]
    pub fn run<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> Result<Run> {
        let started = UtcDateTime::now();
        let timer = Instant::now();
        let calls_before = self.catalog.calls();
        let mut summary = Summary::new(started);
        let mut roms = Vec::new();
        for path in paths {
            let rom = self.reconcile(path)?;
            summary.record(&rom.outcome);
            roms.push(rom);
        }
        // Records are persisted as they arrive; this only catches a library
        // that was upgraded on load and never touched afterwards.
        self.persist()?;
        summary.catalog_calls = self.catalog.calls() - calls_before;
        summary.duration = timer.elapsed();
        tracing::info!(
            processed = summary.processed,
            with_achievements = summary.with_achievements,
            errored = summary.errored,
            catalog_calls = summary.catalog_calls,
            "Reconciliation complete"
        );
        Ok(Run { roms, summary })
    }

    /// Reconcile a single ROM file, starting from its raw bytes.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn reconcile(&mut self, path: impl AsRef<Path>) -> Result<ClassifiedRom> {
        let path = path.as_ref().to_path_buf();
        let Resolution { hash, title, outcome } = self.drive(State::Hashing(path.clone()))?;
        match &outcome {
            Outcome::Error(failure) => tracing::warn!(kind = %failure.kind, message = %failure.message, "ROM not classified"),
            outcome => tracing::info!(?outcome, title = title.as_deref().unwrap_or_default(), "ROM classified"),
        }
        Ok(ClassifiedRom { path, hash, title, outcome })
    }

    /// Classify a content hash computed elsewhere.
    pub fn classify_hash(&mut self, hash: &str) -> Result<Outcome> {
        let hash = hash.trim().to_ascii_lowercase();
        Ok(self.drive(State::Lookup(hash))?.outcome)
    }

    fn drive(&mut self, mut state: State) -> Result<Resolution> {
        let mut hash = None;
        loop {
            tracing::trace!(state = state.name(), "Reconciling");
            if let State::Lookup(current) = &state {
                hash = Some(current.clone());
            }
            state = match state {
                State::Classified { title, achievements } => {
                    return Ok(Resolution { hash, title, outcome: Outcome::from_count(achievements) });
                },
                State::Errored(failure) => return Ok(Resolution { hash, title: None, outcome: Outcome::Error(failure) }),
                State::Hashing(path) => self.hash(&path),
                State::Lookup(hash) => self.lookup(hash),
                State::Indexing(hash) => self.index(hash)?,
                State::Fetching { hash, game_id } => self.fetch(hash, game_id)?,
                State::Upserting { hash, record } => self.upsert(hash, record)?,
            };
        }
    }

    fn hash(&self, path: &Path) -> State {
        match hash_file(path, self.system) {
            Ok(rom) => State::Lookup(rom.hash),
            Err(err) => {
                let kind = if err.is_format_error() { FailureKind::Format } else { FailureKind::Read };
                State::Errored(Failure::new(kind, (*err).to_string()))
            },
        }
    }

    fn lookup(&self, hash: String) -> State {
        if let Some(failure) = self.failed.get(&hash) {
            return State::Errored(failure.clone());
        }
        match self.library.lookup(&hash) {
            Some(HashRecord { achievements: Some(achievements), title, .. }) => State::Classified {
                title: title.clone(),
                achievements: *achievements,
            },
            Some(HashRecord { game_id: Some(game_id), .. }) => State::Fetching { game_id: *game_id, hash },
            _ => match &self.index {
                Index::NotFetched if self.refresh_on_miss => State::Indexing(hash),
                Index::Unavailable(reason) => {
                    State::Errored(Failure::new(FailureKind::Catalog, format!("game list unavailable: {reason}")))
                },
                _ => State::Errored(Failure::new(
                    FailureKind::UnknownRom,
                    format!("hash {hash} is not known to the hash library or the catalog"),
                )),
            },
        }
    }

    fn index(&mut self, hash: String) -> Result<State> {
        tracing::info!(system = %self.system, "Hash library miss, fetching the catalog game list");
        match self.catalog.fetch_game_list(self.system, false) {
            Ok(entries) => {
                let changed = import_catalog(self.library, entries);
                self.library.mark_indexed(self.system.id());
                self.index = Index::Fetched;
                self.persist()?;
                tracing::info!(changed, hashes = self.library.len(), "Imported catalog game list");
                Ok(State::Lookup(hash))
            },
            Err(err) if err.is_fatal() => Err(err).or_raise(|| ErrorKind::Catalog),
            Err(err) => {
                let reason = (*err).to_string();
                tracing::warn!(%reason, "Catalog game list unavailable for this run");
                self.index = Index::Unavailable(reason);
                Ok(self.lookup(hash))
            },
        }
    }

    fn fetch(&mut self, hash: String, game_id: u32) -> Result<State> {
        let failure = match self.catalog.fetch_game(game_id) {
            Ok(detail) => {
                return Ok(State::Upserting {
                    hash,
                    record: HashRecord::new(game_id, detail.title, detail.achievements),
                });
            },
            Err(err) if err.is_fatal() => return Err(err).or_raise(|| ErrorKind::Catalog),
            Err(err) if matches!(*err, CatalogErrorKind::NotFound(_)) => {
                Failure::new(FailureKind::GameNotFound, format!("game {game_id} no longer exists in the catalog"))
            },
            Err(err) => Failure::new(FailureKind::Catalog, (*err).to_string()),
        };
        self.failed.insert(hash, failure.clone());
        Ok(State::Errored(failure))
    }

    fn upsert(&mut self, hash: String, record: HashRecord) -> Result<State> {
        let achievements = record.achievements.unwrap_or_default();
        if self.library.upsert(&hash, record) {
            self.persist()?;
        }
        let title = self.library.lookup(&hash).and_then(|record| record.title.clone());
        Ok(State::Classified { title, achievements })
    }

    fn persist(&mut self) -> Result<()> {
        if self.library.is_dirty() {
            self.library.persist().or_raise(|| ErrorKind::Cache)?;
        }
        Ok(())
    }
}
