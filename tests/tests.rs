use std::path::PathBuf;

use nex::ledger::{LedgerEntry, LedgerStore};
use nex::links::LinkStore;
use nex::lock::NexLock;
use tempfile::TempDir;

fn setup_home() -> TempDir {
    TempDir::new().unwrap()
}

fn entry(id: &str, version: &str, home: &TempDir) -> LedgerEntry {
    LedgerEntry {
        id: id.to_string(),
        version: version.to_string(),
        install_path: home.path().join("packages").join(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_and_links_share_a_home() {
        let home = setup_home();
        let ledger = LedgerStore::new(home.path().join("installed.json"));
        let links = LinkStore::new(home.path().join("links.json"));

        ledger
            .upsert(entry("devkiraa.pagepull", "1.2.0", &home))
            .unwrap();
        links
            .link("devkiraa.pagepull", &home.path().join("dev/pagepull"))
            .unwrap();

        // the two stores are independent documents
        assert!(home.path().join("installed.json").exists());
        assert!(home.path().join("links.json").exists());
        assert_eq!(ledger.list().len(), 1);
        assert_eq!(links.list().len(), 1);
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let home = setup_home();
        let path = home.path().join("installed.json");
        {
            let ledger = LedgerStore::new(&path);
            ledger.upsert(entry("a.b", "1.0.0", &home)).unwrap();
            ledger.upsert(entry("c.d", "2.0.0", &home)).unwrap();
            ledger.upsert(entry("a.b", "1.1.0", &home)).unwrap();
        }

        let reopened = LedgerStore::new(&path);
        let entries = reopened.list();
        assert_eq!(entries.len(), 2);
        assert_eq!(reopened.get("a.b").unwrap().version, "1.1.0");
    }

    #[test]
    fn test_lock_snapshot_from_ledger() {
        let home = setup_home();
        let ledger = LedgerStore::new(home.path().join("installed.json"));
        ledger.upsert(entry("a.b", "1.0.0", &home)).unwrap();

        let lock = NexLock::from_entries(&ledger.list());
        let lock_path = home.path().join("nex.lock");
        lock.save(&lock_path).unwrap();

        let raw = std::fs::read_to_string(&lock_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["packages"]["a.b"]["version"], "1.0.0");
        assert_eq!(
            parsed["packages"]["a.b"]["path"],
            home.path()
                .join("packages/a.b")
                .to_string_lossy()
                .as_ref()
        );
    }

    #[test]
    fn test_link_overwrite_is_last_write_wins() {
        let home = setup_home();
        let links = LinkStore::new(home.path().join("links.json"));
        let path_a = PathBuf::from("/work/a");
        let path_b = PathBuf::from("/work/b");

        links.link("a.b", &path_a).unwrap();
        links.link("a.b", &path_b).unwrap();

        let all = links.list();
        assert_eq!(all.len(), 1);
        assert_eq!(all["a.b"], path_b);
    }
}
