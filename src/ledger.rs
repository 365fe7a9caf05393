use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::util::write_atomic;

/// One installed package as recorded in `installed.json`.
///
/// An entry exists if and only if a successful install materialized
/// `install_path` for that id; entries are never created speculatively.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: String,
    pub version: String,
    #[serde(rename = "path")]
    pub install_path: PathBuf,
}

/// The durable record of installed packages, persisted as a single JSON array.
///
/// Every mutation loads the whole document, applies the change in memory and
/// rewrites the document through an atomic rename, all within the scope of
/// one method call. A missing or unparsable file loads as an empty ledger;
/// the store is self-healing on first use.
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Opens the store at its default location under the nex home directory.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::util::installed_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all entries. Order carries no meaning.
    pub fn list(&self) -> Vec<LedgerEntry> {
        self.load()
    }

    pub fn get(&self, id: &str) -> Option<LedgerEntry> {
        self.load().into_iter().find(|e| e.id == id)
    }

    /// Replaces any existing entry with the same id, otherwise appends.
    /// The document is rewritten before this returns.
    pub fn upsert(&self, entry: LedgerEntry) -> std::io::Result<()> {
        let mut entries = self.load();
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.save(&entries)
    }

    /// Deletes the entry for `id` if present; returns whether anything was
    /// removed. The document is only rewritten when something changed.
    pub fn remove(&self, id: &str) -> std::io::Result<bool> {
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    fn load(&self) -> Vec<LedgerEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "ignoring unparsable ledger at {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn save(&self, entries: &[LedgerEntry]) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(entries).expect("ledger entries serialize");
        write_atomic(&self.path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str, version: &str) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            version: version.to_string(),
            install_path: PathBuf::from(format!("/tmp/nex/packages/{id}")),
        }
    }

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("installed.json"));
        assert!(store.list().is_empty());
        assert!(store.get("a.b").is_none());
    }

    #[test]
    fn test_corrupt_file_is_empty_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("installed.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = LedgerStore::new(&path);
        assert!(store.list().is_empty());
        // first mutation heals the store
        store.upsert(entry("a.b", "1.0.0")).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_upsert_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("installed.json"));
        let e = entry("devkiraa.pagepull", "1.2.0");
        store.upsert(e.clone()).unwrap();
        assert_eq!(store.get("devkiraa.pagepull"), Some(e));
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("installed.json"));
        store.upsert(entry("a.b", "1.0.0")).unwrap();
        store.upsert(entry("a.b", "2.0.0")).unwrap();
        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, "2.0.0");
    }

    #[test]
    fn test_remove_reports_presence() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("installed.json"));
        store.upsert(entry("a.b", "1.0.0")).unwrap();
        assert!(store.remove("a.b").unwrap());
        assert!(!store.remove("a.b").unwrap());
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_remove_missing_does_not_create_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("installed.json");
        let store = LedgerStore::new(&path);
        assert!(!store.remove("a.b").unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_reload_reproduces_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("installed.json");
        let store = LedgerStore::new(&path);
        store.upsert(entry("a.b", "1.0.0")).unwrap();
        store.upsert(entry("c.d", "0.3.1")).unwrap();

        let reopened = LedgerStore::new(&path);
        assert_eq!(reopened.list(), store.list());
    }
}
