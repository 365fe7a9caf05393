use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use colored::Colorize;
use directories::UserDirs;
use tempfile::NamedTempFile;

pub const PACKAGES_DIRNAME: &str = "packages";
pub const INSTALLED_FILENAME: &str = "installed.json";
pub const LINKS_FILENAME: &str = "links.json";

/// Returns the nex home directory, `~/.nex` by default.
///
/// The `NEX_HOME` environment variable overrides the location, which also
/// keeps integration tests away from the real user state.
pub fn nex_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("NEX_HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let user_dirs = UserDirs::new().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(user_dirs.home_dir().join(".nex"))
}

/// Returns the directory packages are materialized into.
pub fn packages_dir() -> Result<PathBuf> {
    Ok(nex_home_dir()?.join(PACKAGES_DIRNAME))
}

/// Ensures the nex home directory structure exists.
/// Creates `~/.nex` and `~/.nex/packages` if they don't already exist.
///
/// Returns the full path to the nex home directory.
pub fn ensure_nex_dirs() -> Result<PathBuf> {
    let home = nex_home_dir()?;
    std::fs::create_dir_all(&home)?;
    std::fs::create_dir_all(home.join(PACKAGES_DIRNAME))?;
    Ok(home)
}

pub fn installed_file() -> Result<PathBuf> {
    Ok(nex_home_dir()?.join(INSTALLED_FILENAME))
}

pub fn links_file() -> Result<PathBuf> {
    Ok(nex_home_dir()?.join(LINKS_FILENAME))
}

/// Writes `contents` to `path` through a temp file in the same directory,
/// then renames it into place. A crash mid-write leaves either the old
/// document or the new one, never a truncated file.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}

pub fn print_info(msg: &str) {
    println!("{} {}", "info:".cyan().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        write_atomic(&path, "[]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        write_atomic(&path, "[1]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1]");
    }
}
