use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use flate2::read::GzDecoder;
use log::{debug, warn};

use crate::error::{NexError, Result};
use crate::ledger::{LedgerEntry, LedgerStore};
use crate::manifest::Manifest;
use crate::registry::Registry;

/// Turns a fetched manifest into an installed directory on disk, and back.
pub trait Materializer {
    /// Downloads and unpacks the package, returning the install path.
    fn materialize(&self, manifest: &Manifest) -> Result<PathBuf>;
    /// Deletes a previously materialized install directory.
    fn dematerialize(&self, install_path: &Path) -> Result<()>;
}

/// Materializer that downloads the package's repository archive and extracts
/// it under the packages directory.
///
/// The tagged archive for the manifest version is preferred; the default
/// branch is the fallback for repositories that do not tag releases.
pub struct HttpMaterializer {
    client: reqwest::blocking::Client,
    packages_dir: PathBuf,
}

impl HttpMaterializer {
    pub fn new(packages_dir: PathBuf) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("nex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NexError::RegistryUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            packages_dir,
        })
    }

    pub fn open_default() -> Result<Self> {
        let dir = crate::util::packages_dir()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Self::new(dir)
    }

    fn fetch_and_unpack(&self, manifest: &Manifest) -> anyhow::Result<PathBuf> {
        let repository = manifest
            .repository
            .as_deref()
            .map(|r| r.trim_end_matches('/'))
            .filter(|r| !r.is_empty())
            .context("manifest has no repository to download from")?;

        let candidates = [
            format!(
                "{repository}/archive/refs/tags/v{}.tar.gz",
                manifest.version
            ),
            format!("{repository}/archive/refs/heads/main.tar.gz"),
        ];

        let mut last_status = None;
        for url in &candidates {
            debug!("GET {url}");
            let response = self.client.get(url).send()?;
            if !response.status().is_success() {
                last_status = Some(response.status());
                continue;
            }
            let bytes = response.bytes()?;
            if !looks_like_archive(url, &bytes) {
                debug!("body from {url} is not an archive, skipping");
                continue;
            }
            let dest = self.packages_dir.join(&manifest.id);
            unpack_archive(url, &bytes, &dest)?;
            return Ok(dest);
        }
        bail!(
            "no downloadable archive for {} (last status: {})",
            manifest.id,
            last_status.map_or_else(|| "none".to_string(), |s| s.to_string())
        )
    }
}

impl Materializer for HttpMaterializer {
    fn materialize(&self, manifest: &Manifest) -> Result<PathBuf> {
        self.fetch_and_unpack(manifest)
            .map_err(|e| NexError::InstallFailed {
                id: manifest.id.clone(),
                reason: format!("{e:#}"),
            })
    }

    fn dematerialize(&self, install_path: &Path) -> Result<()> {
        if install_path.exists() {
            std::fs::remove_dir_all(install_path)?;
        }
        Ok(())
    }
}

/// Extracts a `.zip` or `.tar.gz` archive into `dest`, replacing whatever was
/// there. A single top-level directory (the GitHub archive layout) is
/// stripped.
fn unpack_archive(url: &str, bytes: &[u8], dest: &Path) -> anyhow::Result<()> {
    let parent = dest.parent().context("install path has no parent")?;
    std::fs::create_dir_all(parent)?;
    let staging = tempfile::tempdir_in(parent)?;

    if url.ends_with(".zip") {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        archive.extract(staging.path())?;
    } else {
        let decoder = GzDecoder::new(Cursor::new(bytes));
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(staging.path())?;
    }

    let entries: Vec<_> = std::fs::read_dir(staging.path())?
        .collect::<std::io::Result<Vec<_>>>()?;
    let root = match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => only.path(),
        _ => staging.path().to_path_buf(),
    };

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    if root == staging.path() {
        std::fs::rename(staging.keep(), dest)?;
    } else {
        std::fs::rename(root, dest)?;
    }
    Ok(())
}

/// Checks that archive bytes look like the format their URL claims.
/// Truncated or HTML error bodies fail here instead of in the extractor.
pub fn looks_like_archive(url: &str, bytes: &[u8]) -> bool {
    if url.ends_with(".zip") {
        bytes.starts_with(b"PK")
    } else {
        bytes.starts_with(&[0x1f, 0x8b])
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { version: String },
    AlreadyInstalled { version: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { from: String, to: String },
    UpToDate { version: String },
}

/// Drives install, update and remove transitions over the ledger.
///
/// The only atomicity guarantee here: a failed materialize never creates a
/// ledger entry. Update is remove-then-install in two steps and is not
/// crash-atomic; `remove` followed by `install` is the recovery path.
pub struct Orchestrator<'a> {
    pub ledger: &'a LedgerStore,
    pub registry: &'a dyn Registry,
    pub materializer: &'a dyn Materializer,
}

impl Orchestrator<'_> {
    /// Installs `id` unless the ledger already has it. An installed package
    /// short-circuits before any network access.
    pub fn ensure_installed(&self, id: &str) -> Result<InstallOutcome> {
        if let Some(entry) = self.ledger.get(id) {
            return Ok(InstallOutcome::AlreadyInstalled {
                version: entry.version,
            });
        }

        let manifest = self.registry.fetch_manifest(id)?;
        let install_path = self.materializer.materialize(&manifest)?;
        self.ledger.upsert(LedgerEntry {
            id: id.to_string(),
            version: manifest.version.clone(),
            install_path,
        })?;
        Ok(InstallOutcome::Installed {
            version: manifest.version,
        })
    }

    /// Updates `id` to whatever version the registry reports. Equal version
    /// strings are a no-op; there is no ordering between versions, "newer"
    /// only means "different".
    pub fn update(&self, id: &str) -> Result<UpdateOutcome> {
        let entry = self
            .ledger
            .get(id)
            .ok_or_else(|| NexError::NotInstalled(id.to_string()))?;

        let manifest = self.registry.fetch_manifest(id)?;
        if manifest.version == entry.version {
            return Ok(UpdateOutcome::UpToDate {
                version: entry.version,
            });
        }

        let from = entry.version.clone();
        self.remove_installed(id)?;
        match self.ensure_installed(id)? {
            InstallOutcome::Installed { version } => {
                Ok(UpdateOutcome::Updated { from, to: version })
            }
            // Not reachable: the entry was just removed.
            InstallOutcome::AlreadyInstalled { version } => {
                Ok(UpdateOutcome::UpToDate { version })
            }
        }
    }

    /// Applies `update` to every ledger entry independently; one failure does
    /// not abort the rest.
    pub fn update_all(&self) -> Vec<(String, Result<UpdateOutcome>)> {
        self.ledger
            .list()
            .into_iter()
            .map(|entry| {
                let result = self.update(&entry.id);
                if let Err(e) = &result {
                    warn!("update of {} failed: {e}", entry.id);
                }
                (entry.id, result)
            })
            .collect()
    }

    /// Removes `id` from disk and from the ledger. Disk cleanup is
    /// best-effort; the ledger entry goes away regardless.
    pub fn remove_installed(&self, id: &str) -> Result<LedgerEntry> {
        let entry = self
            .ledger
            .get(id)
            .ok_or_else(|| NexError::NotInstalled(id.to_string()))?;

        if let Err(e) = self.materializer.dematerialize(&entry.install_path) {
            warn!(
                "could not delete {}: {e}; removing ledger entry anyway",
                entry.install_path.display()
            );
        }
        self.ledger.remove(id)?;
        Ok(entry)
    }
}
