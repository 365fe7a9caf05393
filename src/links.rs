use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;

use crate::util::write_atomic;

/// Developer overrides, persisted in `links.json` as an object mapping
/// package id to an absolute local path.
///
/// A link bypasses the registry entirely for its id. Links are independent of
/// the ledger: a package may be linked without ever having been installed.
/// Linking an already-linked id silently replaces the previous mapping.
pub struct LinkStore {
    path: PathBuf,
}

impl LinkStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Opens the store at its default location under the nex home directory.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::util::links_file()?))
    }

    pub fn get(&self, id: &str) -> Option<PathBuf> {
        self.load().remove(id)
    }

    pub fn list(&self) -> BTreeMap<String, PathBuf> {
        self.load()
    }

    /// Registers `id -> local_path`, overwriting any previous link.
    pub fn link(&self, id: &str, local_path: &Path) -> std::io::Result<()> {
        let mut links = self.load();
        links.insert(id.to_string(), local_path.to_path_buf());
        self.save(&links)
    }

    /// Removes the link for `id`; returns whether one existed.
    pub fn unlink(&self, id: &str) -> std::io::Result<bool> {
        let mut links = self.load();
        if links.remove(id).is_none() {
            return Ok(false);
        }
        self.save(&links)?;
        Ok(true)
    }

    fn load(&self) -> BTreeMap<String, PathBuf> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&content) {
            Ok(links) => links,
            Err(e) => {
                warn!(
                    "ignoring unparsable link store at {}: {}",
                    self.path.display(),
                    e
                );
                BTreeMap::new()
            }
        }
    }

    fn save(&self, links: &BTreeMap<String, PathBuf>) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(links).expect("link map serializes");
        write_atomic(&self.path, &content)
    }
}
