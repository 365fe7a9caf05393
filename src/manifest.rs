use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A package manifest as served by the registry.
///
/// Manifests are fetched fresh for every command that needs current metadata
/// (`info`, `install`, `update`, `outdated`) and are never persisted locally.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Namespaced package id of the form `author.name`.
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_author")]
    pub author: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub runtime: RuntimeSpec,
    /// Named commands mapped to their templates, in manifest order.
    #[serde(default)]
    pub commands: IndexMap<String, String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Manifest {
    /// Looks up a command template by exact, case-sensitive name.
    pub fn command(&self, name: &str) -> Option<&str> {
        self.commands.get(name).map(String::as_str)
    }
}

/// The `runtime` object of a manifest, e.g. `{"type": "python", "version": "3.10"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSpec {
    #[serde(rename = "type", default)]
    pub kind: RuntimeKind,
    #[serde(default)]
    pub version: Option<String>,
}

/// The closed set of execution environments a package can declare.
///
/// `Binary` and `Unknown` never require acquisition; anything the manifest
/// names that we do not recognize maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Python,
    Node,
    Bash,
    Powershell,
    Binary,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeKind::Python => "python",
            RuntimeKind::Node => "node",
            RuntimeKind::Bash => "bash",
            RuntimeKind::Powershell => "powershell",
            RuntimeKind::Binary => "binary",
            RuntimeKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One entry of the registry-wide `index.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Registry-relative path to the package's manifest.
    #[serde(default)]
    pub manifest: Option<String>,
}

impl IndexEntry {
    /// The part of the id after the `author.` namespace.
    pub fn short_name(&self) -> &str {
        short_name(&self.id)
    }
}

/// The registry index document.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    pub packages: Vec<IndexEntry>,
}

/// Returns the substring after the first `.`, or the whole id if there is none.
pub fn short_name(id: &str) -> &str {
    id.split_once('.').map(|(_, rest)| rest).unwrap_or(id)
}

/// The manifest `author` field is either a plain string or an object with a
/// `name` key; both collapse to the display name.
fn deserialize_author<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Author {
        Plain(String),
        Object { name: String },
    }

    let author = Option::<Author>::deserialize(deserializer)?;
    Ok(author.map(|a| match a {
        Author::Plain(name) => name,
        Author::Object { name } => name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let json = r#"{
            "id": "devkiraa.pagepull",
            "name": "pagepull",
            "version": "1.2.0",
            "description": "Fetch web pages from the terminal",
            "author": {"name": "devkiraa", "github": "devkiraa"},
            "repository": "https://github.com/devkiraa/pagepull",
            "runtime": {"type": "python", "version": "3.10"},
            "commands": {"default": "python main.py", "fetch": "python main.py fetch"},
            "keywords": ["web", "scraper"]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.id, "devkiraa.pagepull");
        assert_eq!(manifest.runtime.kind, RuntimeKind::Python);
        assert_eq!(manifest.author.as_deref(), Some("devkiraa"));
        assert_eq!(manifest.command("default"), Some("python main.py"));
        // command order follows the manifest
        let names: Vec<_> = manifest.commands.keys().collect();
        assert_eq!(names, vec!["default", "fetch"]);
    }

    #[test]
    fn string_author_and_missing_runtime() {
        let json = r#"{"id": "a.b", "name": "b", "version": "0.1.0", "author": "someone"}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.author.as_deref(), Some("someone"));
        assert_eq!(manifest.runtime.kind, RuntimeKind::Unknown);
        assert!(manifest.commands.is_empty());
    }

    #[test]
    fn unrecognized_runtime_maps_to_unknown() {
        let json = r#"{"id": "a.b", "name": "b", "version": "0.1.0", "runtime": {"type": "ruby"}}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.runtime.kind, RuntimeKind::Unknown);
    }

    #[test]
    fn short_name_splits_on_first_dot() {
        assert_eq!(short_name("devkiraa.pagepull"), "pagepull");
        assert_eq!(short_name("a.b.c"), "b.c");
        assert_eq!(short_name("plain"), "plain");
    }
}
