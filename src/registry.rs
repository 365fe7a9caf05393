use std::time::Duration;

use log::debug;

use crate::error::{NexError, Result};
use crate::manifest::{IndexEntry, Manifest, RegistryIndex};

/// Base URL of the hosted nex registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://raw.githubusercontent.com/devkiraa/nex/main/registry";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read access to the remote package registry.
///
/// Both operations are blocking with a fixed upper bound and fail closed: a
/// transport error, a truncated body and a non-2xx status all collapse into
/// `RegistryUnavailable` (or `NotFound` for a missing manifest).
pub trait Registry {
    fn fetch_index(&self) -> Result<RegistryIndex>;
    fn fetch_manifest(&self, id: &str) -> Result<Manifest>;
}

/// Registry client over blocking HTTPS with an owned [`reqwest`] client.
pub struct HttpRegistry {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_REGISTRY_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("nex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NexError::RegistryUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| NexError::RegistryUnavailable(e.to_string()))?;
        Ok(response)
    }
}

impl Registry for HttpRegistry {
    fn fetch_index(&self) -> Result<RegistryIndex> {
        let url = format!("{}/index.json", self.base_url);
        let response = self.get(&url)?;
        if !response.status().is_success() {
            return Err(NexError::RegistryUnavailable(format!(
                "index fetch returned {}",
                response.status()
            )));
        }
        response
            .json()
            .map_err(|e| NexError::RegistryUnavailable(format!("invalid index: {e}")))
    }

    fn fetch_manifest(&self, id: &str) -> Result<Manifest> {
        let Some((author, name)) = id.split_once('.') else {
            return Err(NexError::NotFound(id.to_string()));
        };
        let url = format!("{}/packages/{}/{}/manifest.json", self.base_url, author, name);
        let response = self.get(&url)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(NexError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(NexError::RegistryUnavailable(format!(
                "manifest fetch returned {}",
                response.status()
            )));
        }
        response.json().map_err(|e| NexError::ManifestInvalid {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Resolves a human-friendly name to a full package id.
///
/// An input that already contains the `author.name` separator is taken as a
/// full id and returned without a registry round trip. Otherwise the index is
/// fetched and the input is matched case-sensitively against each entry's
/// short name; exactly one match resolves, more than one is `Ambiguous`.
///
/// Resolution is a function of the index snapshot it fetched; it must not be
/// cached across command invocations.
pub fn resolve(input: &str, registry: &dyn Registry) -> Result<String> {
    if input.contains('.') {
        return Ok(input.to_string());
    }

    let index = registry.fetch_index()?;
    let mut candidates: Vec<String> = index
        .packages
        .iter()
        .filter(|entry| entry.short_name() == input)
        .map(|entry| entry.id.clone())
        .collect();

    match candidates.len() {
        0 => Err(NexError::NotFound(input.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(NexError::Ambiguous {
            name: input.to_string(),
            candidates,
        }),
    }
}

/// Case-insensitive substring search over id, name, description and keywords.
pub fn search_index<'a>(index: &'a RegistryIndex, query: &str) -> Vec<&'a IndexEntry> {
    let query = query.to_lowercase();
    index
        .packages
        .iter()
        .filter(|entry| {
            entry.id.to_lowercase().contains(&query)
                || entry.name.to_lowercase().contains(&query)
                || entry.description.to_lowercase().contains(&query)
                || entry
                    .keywords
                    .iter()
                    .any(|k| k.to_lowercase().contains(&query))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves a fixed index; fails any manifest fetch.
    struct IndexOnly(RegistryIndex);

    impl Registry for IndexOnly {
        fn fetch_index(&self) -> Result<RegistryIndex> {
            Ok(RegistryIndex {
                packages: self.0.packages.clone(),
            })
        }
        fn fetch_manifest(&self, id: &str) -> Result<Manifest> {
            Err(NexError::NotFound(id.to_string()))
        }
    }

    /// Panics on any access, proving a code path stayed offline.
    struct Unreachable;

    impl Registry for Unreachable {
        fn fetch_index(&self) -> Result<RegistryIndex> {
            panic!("fetch_index called");
        }
        fn fetch_manifest(&self, _id: &str) -> Result<Manifest> {
            panic!("fetch_manifest called");
        }
    }

    fn index(ids: &[&str]) -> RegistryIndex {
        RegistryIndex {
            packages: ids
                .iter()
                .map(|id| IndexEntry {
                    id: id.to_string(),
                    name: crate::manifest::short_name(id).to_string(),
                    version: "1.0.0".to_string(),
                    description: String::new(),
                    keywords: Vec::new(),
                    manifest: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_full_id_resolves_without_network() {
        let id = resolve("devkiraa.pagepull", &Unreachable).unwrap();
        assert_eq!(id, "devkiraa.pagepull");
    }

    #[test]
    fn test_short_name_resolves_to_single_match() {
        let registry = IndexOnly(index(&["devkiraa.pagepull", "other.tool"]));
        assert_eq!(resolve("pagepull", &registry).unwrap(), "devkiraa.pagepull");
    }

    #[test]
    fn test_unknown_short_name_is_not_found() {
        let registry = IndexOnly(index(&["devkiraa.pagepull"]));
        assert!(matches!(
            resolve("missing", &registry),
            Err(NexError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_short_name_is_ambiguous() {
        let registry = IndexOnly(index(&["alice.tool", "bob.tool"]));
        match resolve("tool", &registry) {
            Err(NexError::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates, vec!["alice.tool", "bob.tool"]);
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_short_name_match_is_case_sensitive() {
        let registry = IndexOnly(index(&["devkiraa.PagePull"]));
        assert!(matches!(
            resolve("pagepull", &registry),
            Err(NexError::NotFound(_))
        ));
    }

    #[test]
    fn test_search_matches_keywords_case_insensitively() {
        let mut idx = index(&["devkiraa.pagepull", "other.tool"]);
        idx.packages[0].keywords = vec!["Scraper".to_string()];
        idx.packages[1].description = "a web helper".to_string();

        let hits = search_index(&idx, "scraper");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "devkiraa.pagepull");

        let hits = search_index(&idx, "WEB");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "other.tool");
    }
}
