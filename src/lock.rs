use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::ledger::LedgerEntry;
use crate::util::write_atomic;

pub const LOCKFILE_NAME: &str = "nex.lock";

/// A project-local snapshot of the installed package set.
///
/// Write-only output: nex generates `nex.lock` for humans and CI to pin
/// against, and never reads it back.
#[derive(Serialize, Debug)]
pub struct NexLock {
    pub generated_by: String,
    pub generated_at: String,
    pub packages: BTreeMap<String, LockedPackage>,
}

#[derive(Serialize, Debug)]
pub struct LockedPackage {
    pub version: String,
    pub path: PathBuf,
}

impl NexLock {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
        let generated_at = OffsetDateTime::now_utc()
            .format(&format)
            .unwrap_or_default();

        let packages = entries
            .iter()
            .map(|e| {
                (
                    e.id.clone(),
                    LockedPackage {
                        version: e.version.clone(),
                        path: e.install_path.clone(),
                    },
                )
            })
            .collect();

        NexLock {
            generated_by: format!("nex {}", env!("CARGO_PKG_VERSION")),
            generated_at,
            packages,
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self).expect("lockfile serializes");
        write_atomic(path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries() -> Vec<LedgerEntry> {
        vec![
            LedgerEntry {
                id: "devkiraa.pagepull".to_string(),
                version: "1.2.0".to_string(),
                install_path: PathBuf::from("/home/u/.nex/packages/devkiraa.pagepull"),
            },
            LedgerEntry {
                id: "a.b".to_string(),
                version: "0.1.0".to_string(),
                install_path: PathBuf::from("/home/u/.nex/packages/a.b"),
            },
        ]
    }

    #[test]
    fn test_snapshot_maps_ids_to_versions() {
        let lock = NexLock::from_entries(&entries());
        assert_eq!(lock.packages.len(), 2);
        assert_eq!(lock.packages["devkiraa.pagepull"].version, "1.2.0");
        assert!(lock.generated_by.starts_with("nex "));
        // strftime-style UTC timestamp, e.g. 2026-08-27T10:15:00Z
        assert!(lock.generated_at.ends_with('Z'));
    }

    #[test]
    fn test_save_writes_lockfile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);
        NexLock::from_entries(&entries()).save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["packages"]["a.b"]["version"], "0.1.0");
        assert!(parsed["generated_at"].is_string());
    }
}
