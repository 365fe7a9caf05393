use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use nex::error::NexError;
use nex::installer::{HttpMaterializer, InstallOutcome, Orchestrator, UpdateOutcome};
use nex::ledger::LedgerStore;
use nex::links::LinkStore;
use nex::lock::{LOCKFILE_NAME, NexLock};
use nex::manifest::{Manifest, short_name};
use nex::registry::{HttpRegistry, Registry, resolve, search_index};
use nex::runner::split_command_args;
use nex::runtime::{SystemHost, install_instructions};
use nex::util::{ensure_nex_dirs, print_error, print_info, print_success, print_warning};

use crate::cli::{CLI, NexCommand};

pub fn execute(cli: CLI) -> Result<i32> {
    ensure_nex_dirs()?;
    match cli.command {
        NexCommand::Search { query } => execute_search(&query.join(" ")),
        NexCommand::Info { package } => execute_info(&package),
        NexCommand::Install { package } => execute_install(&package),
        NexCommand::Remove { package } => execute_remove(&package),
        NexCommand::Update { package } => execute_update(package),
        NexCommand::Outdated => execute_outdated(),
        NexCommand::List => execute_list(),
        NexCommand::Run { package, args } => execute_run(&package, args),
        NexCommand::Link => execute_link(),
        NexCommand::Lock => execute_lock(),
    }
}

fn execute_search(query: &str) -> Result<i32> {
    if query.trim().is_empty() {
        bail!("Usage: nex search <query>");
    }
    print_info(&format!("Searching for: {query}"));

    let registry = HttpRegistry::new()?;
    let index = registry.fetch_index()?;
    let hits = search_index(&index, query);

    if hits.is_empty() {
        println!("No packages found matching '{query}'");
        return Ok(0);
    }

    println!();
    println!("{:<40} {:<12} {}", "PACKAGE".bold(), "VERSION".bold(), "DESCRIPTION".bold());
    for entry in &hits {
        let description = truncated(&entry.description, 46);
        println!("{:<40} {:<12} {}", entry.id, entry.version, description);
    }
    println!("\nFound {} package(s). Install with: nex install <package>", hits.len());
    Ok(0)
}

fn execute_info(package: &str) -> Result<i32> {
    let registry = HttpRegistry::new()?;
    let id = resolve(package, &registry)?;
    let manifest = registry.fetch_manifest(&id)?;

    println!();
    println!("Package: {}", manifest.name.bold());
    println!("ID:      {}", manifest.id);
    println!("Version: {}", manifest.version);
    if let Some(author) = &manifest.author {
        println!("Author:  {author}");
    }
    if !manifest.description.is_empty() {
        println!("\nDescription:\n  {}", manifest.description);
    }
    println!("\nRuntime: {}{}", manifest.runtime.kind, match &manifest.runtime.version {
        Some(v) => format!(" {v}"),
        None => String::new(),
    });
    if let Some(repository) = &manifest.repository {
        println!("Repository: {repository}");
    }
    if !manifest.commands.is_empty() {
        println!("\nCommands:");
        for (name, template) in &manifest.commands {
            println!("  {name}: {template}");
        }
    }
    if !manifest.keywords.is_empty() {
        println!("\nKeywords: {}", manifest.keywords.join(", "));
    }

    let ledger = LedgerStore::open_default()?;
    match ledger.get(&id) {
        Some(entry) => {
            println!("\nStatus: Installed (version {})", entry.version);
            println!("Location: {}", entry.install_path.display());
        }
        None => {
            println!("\nStatus: Not installed");
            println!("Install with: nex install {id}");
        }
    }
    println!();
    Ok(0)
}

fn execute_install(package: &str) -> Result<i32> {
    let registry = HttpRegistry::new()?;
    let id = resolve(package, &registry)?;
    let ledger = LedgerStore::open_default()?;
    let materializer = HttpMaterializer::open_default()?;
    let orchestrator = Orchestrator {
        ledger: &ledger,
        registry: &registry,
        materializer: &materializer,
    };

    match orchestrator.ensure_installed(&id)? {
        InstallOutcome::AlreadyInstalled { version } => {
            print_info(&format!("Package '{id}' is already installed (version {version})"));
            println!("Use 'nex update {id}' to update to the latest version.");
        }
        InstallOutcome::Installed { version } => {
            print_success(&format!("Successfully installed: {id} ({version})"));
            println!("Run with: nex run {id}");
        }
    }
    Ok(0)
}

fn execute_remove(package: &str) -> Result<i32> {
    let ledger = LedgerStore::open_default()?;
    let id = resolve_installed(&ledger, package)?;
    let registry = HttpRegistry::new()?;
    let materializer = HttpMaterializer::open_default()?;
    let orchestrator = Orchestrator {
        ledger: &ledger,
        registry: &registry,
        materializer: &materializer,
    };

    print_info(&format!("Removing package: {id}"));
    orchestrator.remove_installed(&id)?;
    print_success(&format!("Successfully removed: {id}"));
    Ok(0)
}

fn execute_update(package: Option<String>) -> Result<i32> {
    let ledger = LedgerStore::open_default()?;
    let registry = HttpRegistry::new()?;
    let materializer = HttpMaterializer::open_default()?;
    let orchestrator = Orchestrator {
        ledger: &ledger,
        registry: &registry,
        materializer: &materializer,
    };

    if let Some(package) = package {
        let id = resolve_installed(&ledger, &package)?;
        match orchestrator.update(&id)? {
            UpdateOutcome::UpToDate { version } => {
                print_info(&format!("Package '{id}' is already at the latest version ({version})"));
            }
            UpdateOutcome::Updated { from, to } => {
                print_success(&format!("Successfully updated {id}: {from} -> {to}"));
            }
        }
        return Ok(0);
    }

    print_info("Checking for updates...");
    if ledger.list().is_empty() {
        print_info("No packages installed");
        return Ok(0);
    }

    let mut updated = 0;
    for (id, result) in orchestrator.update_all() {
        match result {
            Ok(UpdateOutcome::Updated { from, to }) => {
                print_info(&format!("Updated {id}: {from} -> {to}"));
                updated += 1;
            }
            Ok(UpdateOutcome::UpToDate { .. }) => {}
            Err(e) => print_warning(&format!("Could not update {id}: {e}")),
        }
    }

    if updated > 0 {
        print_success(&format!("Updated {updated} package(s)"));
    } else {
        print_info("All packages are up to date");
    }
    Ok(0)
}

fn execute_outdated() -> Result<i32> {
    let ledger = LedgerStore::open_default()?;
    let entries = ledger.list();
    if entries.is_empty() {
        println!("No packages installed.");
        return Ok(0);
    }

    let registry = HttpRegistry::new()?;
    println!("\nComparing installed packages with registry...\n");
    println!("{:<25} {:<15} {:<15}", "PACKAGE".bold(), "CURRENT".bold(), "LATEST".bold());

    let mut outdated = 0;
    for entry in &entries {
        match registry.fetch_manifest(&entry.id) {
            Ok(manifest) if manifest.version != entry.version => {
                println!(
                    "{:<25} {:<15} {:<15}",
                    short_name(&entry.id),
                    entry.version.dimmed(),
                    manifest.version.green()
                );
                outdated += 1;
            }
            Ok(_) => {}
            Err(e) => print_warning(&format!("Could not check {}: {e}", entry.id)),
        }
    }

    if outdated == 0 {
        println!("\n{}", "All packages are up to date!".green());
    } else {
        println!("\n{outdated} package(s) have updates available.");
        println!("Run 'nex update' to upgrade them.");
    }
    Ok(0)
}

fn execute_list() -> Result<i32> {
    let ledger = LedgerStore::open_default()?;
    let entries = ledger.list();

    if entries.is_empty() {
        println!("No packages installed.");
        println!("Run 'nex search <query>' to find packages.");
        return Ok(0);
    }

    println!("Installed packages:\n");
    println!("{:<40} {:<15}", "PACKAGE".bold(), "VERSION".bold());
    for entry in &entries {
        println!("{:<40} {:<15}", entry.id, entry.version);
    }
    println!("\nTotal: {} package(s)", entries.len());
    Ok(0)
}

fn execute_run(package: &str, raw_args: Vec<String>) -> Result<i32> {
    let (command, args) = split_command_args(&raw_args);
    let links = LinkStore::open_default()?;
    let ledger = LedgerStore::open_default()?;
    let host = SystemHost;

    // linked development directories win over everything else
    let id = resolve_runnable(&links, &ledger, package)?;
    if let Some(local_path) = links.get(&id) {
        let manifest = load_local_manifest(&local_path)?;
        return run_and_report(&manifest, &local_path, command, args, &host);
    }

    let registry = HttpRegistry::new()?;
    let materializer = HttpMaterializer::open_default()?;
    let orchestrator = Orchestrator {
        ledger: &ledger,
        registry: &registry,
        materializer: &materializer,
    };

    let entry = match ledger.get(&id) {
        Some(entry) => entry,
        None => {
            print_info(&format!("Package '{id}' is not installed. Installing now..."));
            orchestrator.ensure_installed(&id)?;
            print_success("Package installed successfully");
            ledger
                .get(&id)
                .context("package vanished from the ledger after install")?
        }
    };

    // materialized packages carry their manifest; fall back to the registry
    let manifest = match load_local_manifest(&entry.install_path) {
        Ok(manifest) => manifest,
        Err(_) => registry.fetch_manifest(&id)?,
    };
    run_and_report(&manifest, &entry.install_path, command, args, &host)
}

fn run_and_report(
    manifest: &Manifest,
    package_dir: &Path,
    command: &str,
    args: &[String],
    host: &SystemHost,
) -> Result<i32> {
    match nex::runner::execute(manifest, package_dir, command, args, host) {
        Ok(code) => Ok(code),
        Err(NexError::RuntimeInstallDeclined(kind)) => {
            println!("\nManual installation instructions:\n{}\n", install_instructions(kind));
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

fn execute_link() -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let manifest =
        load_local_manifest(&cwd).context("No valid manifest.json found in current directory")?;

    let links = LinkStore::open_default()?;
    links.link(&manifest.id, &cwd)?;

    print_success(&format!("Package linked: {} -> {}", manifest.id.bold(), cwd.display()));
    println!("You can now run 'nex run {}' to use your local code.", manifest.id);
    Ok(0)
}

fn execute_lock() -> Result<i32> {
    let ledger = LedgerStore::open_default()?;
    let entries = ledger.list();
    if entries.is_empty() {
        println!("No packages installed to lock.");
        return Ok(0);
    }

    let path = std::env::current_dir()?.join(LOCKFILE_NAME);
    NexLock::from_entries(&entries).save(&path)?;
    print_success(&format!("Lockfile generated: {LOCKFILE_NAME}"));
    println!("Contains {} package(s).", entries.len());
    Ok(0)
}

/// Shortens a description to at most `max_chars` characters plus an ellipsis.
/// Descriptions come from the registry and may be any valid UTF-8; the cut
/// always lands on a character boundary.
fn truncated(description: &str, max_chars: usize) -> String {
    if description.chars().count() <= max_chars {
        return description.to_string();
    }
    let mut out: String = description.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Reads `manifest.json` from a package directory (a materialized install or
/// a linked development checkout).
fn load_local_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join("manifest.json");
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let manifest: Manifest =
        serde_json::from_str(&raw).with_context(|| format!("invalid manifest at {}", path.display()))?;
    Ok(manifest)
}

/// Resolves a name against the ledger only, for commands that require an
/// installed package anyway. Never touches the network.
fn resolve_installed(ledger: &LedgerStore, input: &str) -> Result<String> {
    if input.contains('.') {
        return Ok(input.to_string());
    }
    let matches: Vec<String> = ledger
        .list()
        .into_iter()
        .filter(|e| short_name(&e.id) == input)
        .map(|e| e.id)
        .collect();
    match matches.len() {
        0 => Err(NexError::NotInstalled(input.to_string()).into()),
        1 => Ok(matches.into_iter().next().expect("one match")),
        _ => Err(NexError::Ambiguous {
            name: input.to_string(),
            candidates: matches,
        }
        .into()),
    }
}

/// Resolution order for `run`: link store, then ledger, then the registry.
fn resolve_runnable(links: &LinkStore, ledger: &LedgerStore, input: &str) -> Result<String> {
    if input.contains('.') {
        return Ok(input.to_string());
    }
    let linked: Vec<String> = links
        .list()
        .into_keys()
        .filter(|id| short_name(id) == input)
        .collect();
    if linked.len() == 1 {
        return Ok(linked.into_iter().next().expect("one match"));
    }
    if linked.len() > 1 {
        return Err(NexError::Ambiguous {
            name: input.to_string(),
            candidates: linked,
        }
        .into());
    }
    if let Ok(id) = resolve_installed(ledger, input) {
        return Ok(id);
    }
    let registry = HttpRegistry::new()?;
    Ok(resolve(input, &registry)?)
}

pub fn report_error(e: &anyhow::Error) {
    print_error(&format!("{e:#}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use nex::ledger::LedgerEntry;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn entry(id: &str) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            version: "1.0.0".to_string(),
            install_path: PathBuf::from(format!("/tmp/nex/packages/{id}")),
        }
    }

    #[test]
    fn test_short_description_is_untouched() {
        assert_eq!(truncated("a web helper", 46), "a web helper");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // the 46th character is multibyte; a byte-indexed cut would split it
        let description = format!("{}é and some trailing text", "a".repeat(45));
        let cut = truncated(&description, 46);
        assert_eq!(cut, format!("{}é...", "a".repeat(45)));
    }

    #[test]
    fn test_ambiguous_installed_short_name_lists_candidates() {
        let dir = tempdir().unwrap();
        let ledger = LedgerStore::new(dir.path().join("installed.json"));
        ledger.upsert(entry("alice.tool")).unwrap();
        ledger.upsert(entry("bob.tool")).unwrap();

        let err = resolve_installed(&ledger, "tool").unwrap_err();
        match err.downcast_ref::<NexError>() {
            Some(NexError::Ambiguous { candidates, .. }) => {
                let ids: Vec<&str> = candidates.iter().map(String::as_str).collect();
                assert_eq!(ids, ["alice.tool", "bob.tool"]);
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_link_short_name_is_ambiguous() {
        let dir = tempdir().unwrap();
        let links = LinkStore::new(dir.path().join("links.json"));
        links.link("alice.tool", Path::new("/work/a")).unwrap();
        links.link("bob.tool", Path::new("/work/b")).unwrap();
        let ledger = LedgerStore::new(dir.path().join("installed.json"));

        // two linked matches must error out before the ledger or the
        // registry is ever consulted
        let err = resolve_runnable(&links, &ledger, "tool").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NexError>(),
            Some(NexError::Ambiguous { .. })
        ));
    }
}
