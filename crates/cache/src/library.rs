use crate::HashRecord;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// On-disk layout written by this crate.
#[derive(Serialize)]
struct CurrentRef<'a> {
    hashes: BTreeMap<&'a str, &'a HashRecord>,
    #[serde(skip_serializing_if = "nothing_indexed")]
    indexed: &'a BTreeSet<u32>,
}

fn nothing_indexed(indexed: &&BTreeSet<u32>) -> bool {
    indexed.is_empty()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OnDisk {
    Current {
        hashes: HashMap<String, HashRecord>,
        /// Catalog system ids whose full game list has been imported.
        #[serde(default)]
        indexed: BTreeSet<u32>,
    },
    /// The hash library format used before records carried titles and
    /// achievement counts: `{"Success": true, "MD5List": {"<md5>": <game id>}}`.
    Legacy {
        #[serde(rename = "Success", default = "legacy_success")]
        success: bool,
        #[serde(rename = "MD5List")]
        md5_list: HashMap<String, u32>,
    },
}

fn legacy_success() -> bool {
    true
}

fn normalize(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

/// In-memory mapping from content hash to [`HashRecord`], backed by a single
/// JSON file.
///
/// The library is loaded once, mutated in place (records are never removed),
/// and written back with [`persist`](Self::persist). Persisting replaces the
/// file atomically, so an interrupted write can never leave a truncated or
/// unparseable library behind.
///
/// Hash keys are case-insensitive: they are lowercased on every operation.
#[derive(Debug, Clone)]
pub struct HashLibrary {
    path: PathBuf,
    records: HashMap<String, HashRecord>,
    indexed: BTreeSet<u32>,
    dirty: bool,
}

impl HashLibrary {
    /// An empty library that will be persisted to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: HashMap::new(),
            indexed: BTreeSet::new(),
            dirty: false,
        }
    }

    /// Load the library from `path`.
    ///
    /// A missing file is not an error (first run): an empty library is
    /// returned. A file that exists but cannot be parsed fails with
    /// [`ErrorKind::Corrupt`]. Libraries in the legacy `MD5List` format are
    /// accepted and upgraded on the next persist.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match fs::read(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No hash library found; starting with an empty one");
                return Ok(Self::new(path));
            },
            result => result.or_raise(|| ErrorKind::Read(path.to_path_buf()))?,
        };
        // Bytes rather than a string: a file that isn't UTF-8 is corrupt, not unreadable.
        let on_disk: OnDisk = serde_json::from_slice(&contents).or_raise(|| ErrorKind::Corrupt(path.to_path_buf()))?;
        let (records, indexed, dirty) = match on_disk {
            OnDisk::Current { hashes, indexed } => (hashes, indexed, false),
            OnDisk::Legacy { success: false, .. } => exn::bail!(ErrorKind::Corrupt(path.to_path_buf())),
            OnDisk::Legacy { md5_list, .. } => {
                tracing::info!(hashes = md5_list.len(), "Upgrading legacy hash library");
                let records = md5_list.into_iter().map(|(hash, id)| (hash, HashRecord::game(id))).collect();
                (records, BTreeSet::new(), true)
            },
        };
        // Keys written by other tools may not be normalized; collisions after
        // normalization are merged rather than dropped.
        let mut library = Self::new(path);
        for (hash, record) in records {
            library.upsert(hash, record);
        }
        library.indexed = indexed;
        library.dirty = dirty;
        tracing::debug!(hashes = library.len(), indexed = ?library.indexed, "Loaded hash library");
        Ok(library)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` if there are changes that have not been persisted yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `true` once the complete catalog game list for `system_id` has been
    /// imported. Hashes still missing after that are unknown to the catalog.
    pub fn is_indexed(&self, system_id: u32) -> bool {
        self.indexed.contains(&system_id)
    }

    /// Records that the complete game list for `system_id` has been imported.
    pub fn mark_indexed(&mut self, system_id: u32) -> bool {
        let changed = self.indexed.insert(system_id);
        self.dirty |= changed;
        changed
    }

    /// Look up a content hash. Never fails; `None` means "unknown hash".
    pub fn lookup(&self, hash: impl AsRef<str>) -> Option<&HashRecord> {
        self.records.get(&normalize(hash.as_ref()))
    }

    /// Insert a record, or merge it into the existing record for the same
    /// hash (see [`HashRecord::merge`]).
    ///
    /// Returns `true` if the library changed. Re-inserting identical data is
    /// a no-op and does not mark the library dirty.
    pub fn upsert(&mut self, hash: impl AsRef<str>, record: HashRecord) -> bool {
        let changed = match self.records.entry(normalize(hash.as_ref())) {
            std::collections::hash_map::Entry::Occupied(mut entry) => entry.get_mut().merge(record),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(record);
                true
            },
        };
        self.dirty |= changed;
        changed
    }

    /// Upsert every `(hash, record)` pair, e.g. from a catalog game list.
    ///
    /// Returns the number of hashes whose record changed.
    pub fn import_game_list<H: AsRef<str>>(&mut self, entries: impl IntoIterator<Item = (H, HashRecord)>) -> usize {
        entries.into_iter().map(|(hash, record)| self.upsert(hash, record)).filter(|changed| *changed).count()
    }

    /// Merge all records of another library into this one.
    ///
    /// The other library's indexed systems are not taken over: its game list
    /// may be older than this library's.
    pub fn merge_from(&mut self, other: HashLibrary) -> usize {
        other.records.into_iter().map(|(hash, record)| self.upsert(hash, record)).filter(|changed| *changed).count()
    }

    /// Write the library to its own path and clear the dirty flag.
    pub fn persist(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.persist_to(&path)?;
        self.dirty = false;
        Ok(())
    }

    /// Atomically write the full mapping to `path`.
    ///
    /// The JSON is written to a temporary file in the same directory, synced,
    /// and then renamed over `path`. The directory is synced as well so that
    /// the rename itself is durable. Missing parent directories are created.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), hashes = self.records.len()))]
    pub fn persist_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let error = || ErrorKind::Write(path.to_path_buf());
        let document = CurrentRef {
            hashes: self.records.iter().map(|(hash, record)| (hash.as_str(), record)).collect(),
            indexed: &self.indexed,
        };
        let mut json = serde_json::to_vec_pretty(&document).or_raise(error)?;
        json.push(b'\n');

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).or_raise(error)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent).or_raise(error)?;
        tmp.write_all(&json).or_raise(error)?;
        tmp.as_file().sync_all().or_raise(error)?;
        tmp.persist(path).or_raise(error)?;
        #[cfg(unix)]
        fs::File::open(parent).and_then(|dir| dir.sync_all()).or_raise(error)?;
        tracing::debug!("Persisted hash library");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_in(dir: &tempfile::TempDir) -> HashLibrary {
        HashLibrary::new(dir.path().join("hashlibrary.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = HashLibrary::load(temp_dir.path().join("nope.json")).unwrap();
        assert!(library.is_empty());
        assert!(!library.is_dirty());
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("hashlibrary.json");
        fs::write(&path, b"{\"hashes\": {\"abc\": ").unwrap();
        let err = HashLibrary::load(&path).unwrap_err();
        assert_eq!(*err, ErrorKind::Corrupt(path));
    }

    #[test]
    fn test_load_non_utf8_file_is_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("hashlibrary.json");
        fs::write(&path, [0xFF, 0xFE, 0x00, b'{']).unwrap();
        let err = HashLibrary::load(&path).unwrap_err();
        assert_eq!(*err, ErrorKind::Corrupt(path));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_load_unrecognized_document_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("hashlibrary.json");
        fs::write(&path, b"\"not a library\"").unwrap();
        assert!(matches!(*HashLibrary::load(&path).unwrap_err(), ErrorKind::Corrupt(_)));
    }

    #[test]
    fn test_load_legacy_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("0_hashlibrary.json");
        fs::write(&path, br#"{"Success": true, "MD5List": {"ABCDEF": 42, "123456": 7}}"#).unwrap();
        let library = HashLibrary::load(&path).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.lookup("abcdef"), Some(&HashRecord::game(42)));
        // Upgraded on next persist.
        assert!(library.is_dirty());
    }

    #[test]
    fn test_load_legacy_failure_status_is_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("0_hashlibrary.json");
        fs::write(&path, br#"{"Success": false, "MD5List": {}}"#).unwrap();
        assert!(matches!(*HashLibrary::load(&path).unwrap_err(), ErrorKind::Corrupt(_)));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("ABC123", HashRecord::new(42, "Game X", 10));
        assert_eq!(library.lookup("abc123"), Some(&HashRecord::new(42, "Game X", 10)));
        assert_eq!(library.lookup(" ABC123 "), library.lookup("abc123"));
        assert_eq!(library.lookup("def456"), None);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        assert!(library.upsert("abc", HashRecord::new(1, "A", 2)));
        library.persist().unwrap();
        assert!(!library.upsert("ABC", HashRecord::new(1, "A", 2)));
        assert!(!library.is_dirty());
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_upserts_accumulate_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("abc", HashRecord::game(42));
        library.upsert("abc", HashRecord { title: Some("Game X".to_string()), ..HashRecord::default() });
        library.upsert("abc", HashRecord { achievements: Some(10), ..HashRecord::default() });
        library.upsert("abc", HashRecord::default());
        assert_eq!(library.lookup("abc"), Some(&HashRecord::new(42, "Game X", 10)));
    }

    #[test]
    fn test_persist_then_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("ABC123", HashRecord::new(42, "Game X", 10));
        library.upsert("def456", HashRecord::game(7));
        library.persist().unwrap();
        assert!(!library.is_dirty());

        let reloaded = HashLibrary::load(library.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.lookup("abc123"), Some(&HashRecord::new(42, "Game X", 10)));
        assert_eq!(reloaded.lookup("def456"), Some(&HashRecord::game(7)));
    }

    #[test]
    fn test_persist_format_is_sorted_and_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("bbb", HashRecord::game(2));
        library.upsert("aaa", HashRecord::new(1, "A", 0));
        library.persist().unwrap();

        let written = fs::read_to_string(library.path()).unwrap();
        let aaa = written.find("\"aaa\"").unwrap();
        let bbb = written.find("\"bbb\"").unwrap();
        assert!(aaa < bbb);
        let files: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_persist_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = HashLibrary::new(temp_dir.path().join("data/cache/hashlibrary.json"));
        library.upsert("abc", HashRecord::game(1));
        library.persist().unwrap();
        assert!(library.path().exists());
    }

    #[test]
    fn test_failed_persist_keeps_previous_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("abc", HashRecord::game(1));
        library.persist().unwrap();
        // A directory cannot be replaced by a file.
        let blocked = temp_dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("inner"), b"x").unwrap();
        let err = library.persist_to(&blocked).unwrap_err();
        assert_eq!(*err, ErrorKind::Write(blocked));
        assert_eq!(HashLibrary::load(library.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_import_game_list_counts_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("abc", HashRecord::new(1, "A", 3));
        let changed = library.import_game_list([
            ("abc", HashRecord::new(1, "A", 3)),
            ("def", HashRecord::game(2)),
            ("ghi", HashRecord::new(3, "C", 0)),
        ]);
        assert_eq!(changed, 2);
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn test_merge_from() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("abc", HashRecord::new(1, "A", 3));
        let mut other = HashLibrary::new(temp_dir.path().join("other.json"));
        other.upsert("abc", HashRecord::game(1));
        other.upsert("def", HashRecord::game(2));
        assert_eq!(library.merge_from(other), 1);
        assert_eq!(library.lookup("abc"), Some(&HashRecord::new(1, "A", 3)));
    }

    #[test]
    fn test_indexed_systems_survive_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        assert!(!library.is_indexed(5));
        assert!(library.mark_indexed(5));
        assert!(!library.mark_indexed(5));
        assert!(library.is_dirty());
        library.persist().unwrap();

        let written = fs::read_to_string(library.path()).unwrap();
        assert!(written.contains("\"indexed\""));
        let reloaded = HashLibrary::load(library.path()).unwrap();
        assert!(reloaded.is_indexed(5));
        assert!(!reloaded.is_indexed(4));
    }

    #[test]
    fn test_unindexed_library_omits_marker() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut library = library_in(&temp_dir);
        library.upsert("abc", HashRecord::game(1));
        library.persist().unwrap();
        assert!(!fs::read_to_string(library.path()).unwrap().contains("indexed"));
    }
}
