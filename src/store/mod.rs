//! Content store — one durable JSON document per entry.
//!
//! Layout: `<dir>/<id>.json` per entry plus `<dir>/.usage.json` holding the
//! usage snapshot (the leading dot keeps it out of the entry namespace, which
//! forbids leading dots). All writes go through a temp-file + rename so a
//! crash mid-write never leaves a truncated document. Documents tolerate
//! external hand-editing: a single corrupt document is skipped and logged at
//! load, never fatal, and hashes are recomputed rather than trusted.

use crate::catalog::model::{Entry, UsageRecord};
use crate::types::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Usage snapshot document name. Outside the entry id namespace.
const USAGE_SNAPSHOT: &str = ".usage.json";

/// Result of scanning the store directory.
#[derive(Debug, Default)]
pub struct LoadedEntries {
    pub entries: Vec<Entry>,
    /// `(file name, parse error)` for documents that could not be loaded.
    pub skipped: Vec<(String, String)>,
}

/// Durable per-entry document store.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::write_failure(format!("create store dir: {}", e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn usage_path(&self) -> PathBuf {
        self.dir.join(USAGE_SNAPSHOT)
    }

    /// Persist one entry atomically.
    pub fn save_entry(&self, entry: &Entry) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entry)?;
        self.atomic_write(&self.entry_path(entry.id.as_str()), &bytes)
    }

    /// Delete an entry's document. Absence is not an error.
    pub fn remove_entry(&self, id: &str) -> Result<bool> {
        match std::fs::remove_file(self.entry_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::write_failure(format!("remove {}: {}", id, e))),
        }
    }

    /// Read a single entry document straight from disk, bypassing any cache.
    pub fn load_entry(&self, id: &str) -> Result<Option<Entry>> {
        let path = self.entry_path(id);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::from(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Enumerate and parse all entry documents.
    ///
    /// A corrupt document is skipped and logged, never aborts the whole load.
    pub fn load_entries(&self) -> Result<LoadedEntries> {
        let mut loaded = LoadedEntries::default();

        let read_dir = std::fs::read_dir(&self.dir)?;
        for dirent in read_dir {
            let dirent = dirent?;
            let name = dirent.file_name().to_string_lossy().to_string();
            if !name.ends_with(".json") || name == USAGE_SNAPSHOT || name.starts_with('.') {
                continue;
            }

            let bytes = match std::fs::read(dirent.path()) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("Skipping unreadable document {}: {}", name, e);
                    loaded.skipped.push((name, e.to_string()));
                    continue;
                }
            };

            match serde_json::from_slice::<Entry>(&bytes) {
                // A hand-copied file whose stem disagrees with the embedded
                // id would alias another document; skip it like corruption.
                Ok(entry) => {
                    let stem = name.trim_end_matches(".json");
                    if entry.id.as_str() != stem {
                        let reason = format!(
                            "entry id '{}' does not match file name",
                            entry.id.as_str()
                        );
                        tracing::warn!("Skipping mismatched document {}: {}", name, reason);
                        loaded.skipped.push((name, reason));
                        continue;
                    }
                    loaded.entries.push(entry);
                }
                Err(e) => {
                    tracing::warn!("Skipping corrupt document {}: {}", name, e);
                    loaded.skipped.push((name, e.to_string()));
                }
            }
        }

        loaded.entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(loaded)
    }

    /// Load the usage snapshot, or an empty map if none exists yet.
    pub fn load_usage(&self) -> Result<HashMap<String, UsageRecord>> {
        let bytes = match std::fs::read(self.usage_path()) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(Error::from(e)),
        };
        match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A hand-mangled snapshot loses history but must not wedge
                // the server.
                tracing::warn!("Usage snapshot unreadable, starting fresh: {}", e);
                Ok(HashMap::new())
            }
        }
    }

    /// Persist the usage snapshot atomically.
    pub fn save_usage(&self, usage: &HashMap<String, UsageRecord>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(usage)?;
        self.atomic_write(&self.usage_path(), &bytes)
    }

    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::write_failure(format!("temp file: {}", e)))?;
        tmp.write_all(bytes)
            .map_err(|e| Error::write_failure(format!("write temp: {}", e)))?;
        tmp.flush()
            .map_err(|e| Error::write_failure(format!("flush temp: {}", e)))?;
        tmp.persist(path)
            .map_err(|e| Error::write_failure(format!("persist {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{Audience, Requirement, SCHEMA_VERSION};
    use crate::types::EntryId;
    use chrono::Utc;

    fn entry(id: &str, body: &str) -> Entry {
        Entry {
            id: EntryId::new(id).unwrap(),
            title: format!("Entry {}", id),
            body: body.to_string(),
            priority: 50,
            audience: Audience::All,
            requirement: Requirement::Recommended,
            categories: vec![],
            risk_score: None,
            source_hash: crate::hash::digest_text(body),
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            usage_count: None,
            last_used_at: None,
            first_seen_ts: None,
            governance: None,
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        store.save_entry(&entry("a", "alpha")).unwrap();
        store.save_entry(&entry("b", "beta")).unwrap();

        let loaded = store.load_entries().unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.entries[0].id.as_str(), "a");
    }

    #[test]
    fn remove_absent_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();
        assert!(!store.remove_entry("ghost").unwrap());

        store.save_entry(&entry("real", "x")).unwrap();
        assert!(store.remove_entry("real").unwrap());
        assert!(store.load_entry("real").unwrap().is_none());
    }

    #[test]
    fn corrupt_document_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        store.save_entry(&entry("good", "fine")).unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{ not json").unwrap();

        let loaded = store.load_entries().unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].0, "bad.json");
    }

    #[test]
    fn document_with_mismatched_file_name_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        store.save_entry(&entry("a", "body")).unwrap();
        // A hand-copied file must not alias the original id.
        std::fs::copy(dir.path().join("a.json"), dir.path().join("b.json")).unwrap();

        let loaded = store.load_entries().unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].id.as_str(), "a");
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].0, "b.json");
    }

    #[test]
    fn usage_snapshot_round_trip_and_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let mut usage = HashMap::new();
        usage.insert(
            "e1".to_string(),
            UsageRecord {
                usage_count: 3,
                first_seen_ts: Utc::now(),
                last_used_at: Utc::now(),
            },
        );
        store.save_usage(&usage).unwrap();

        // The snapshot document is not an entry.
        assert!(store.load_entries().unwrap().entries.is_empty());

        let back = store.load_usage().unwrap();
        assert_eq!(back.get("e1").unwrap().usage_count, 3);
    }

    #[test]
    fn missing_usage_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();
        assert!(store.load_usage().unwrap().is_empty());
    }
}
