use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{NexError, Result};
use crate::manifest::RuntimeKind;

/// Narrow capability interface the acquisition engine drives the host
/// through. Production code uses [`SystemHost`]; tests inject a fake so the
/// state machine runs without real subprocesses.
pub trait Host {
    /// Whether `program` can be launched from PATH.
    fn probe(&self, program: &str) -> bool;
    /// Captured output of `program <flag>`, if the program runs at all.
    fn version_output(&self, program: &str, flag: &str) -> Option<String>;
    /// Asks a yes/no question; `default_yes` applies to a plain Enter.
    fn confirm(&self, question: &str, default_yes: bool) -> bool;
    /// Installs the runtime through the host's package manager or installer.
    fn install(&self, kind: RuntimeKind) -> std::result::Result<(), String>;
}

/// Terminal success states of the acquisition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// The runtime was already present.
    Available,
    /// The runtime was installed now and found again on re-detection.
    Verified,
}

/// Whether a plain Enter at the install prompt means "yes".
///
/// Windows defaults to accept, everywhere else defaults to decline. The
/// asymmetry is deliberate and load-bearing; keep it.
pub const fn prompt_default_accept() -> bool {
    cfg!(windows)
}

/// Runs detection for one runtime kind against the host.
///
/// A `python` executable that reports Python 2 counts as missing; only
/// `python3`, or a `python` whose version output names Python 3, satisfies
/// the python runtime.
pub fn detect(kind: RuntimeKind, host: &dyn Host) -> bool {
    match kind {
        RuntimeKind::Binary | RuntimeKind::Unknown => true,
        RuntimeKind::Python => {
            if host.probe("python3") {
                return true;
            }
            host.probe("python")
                && host
                    .version_output("python", "--version")
                    .is_some_and(|v| v.contains("Python 3"))
        }
        RuntimeKind::Node => host.probe("node"),
        RuntimeKind::Bash => host.probe("bash"),
        RuntimeKind::Powershell => {
            if cfg!(windows) {
                host.probe("powershell")
            } else {
                host.probe("pwsh")
            }
        }
    }
}

/// The executable the dispatcher should use for python packages. Only valid
/// after [`detect`] succeeded for `Python`.
pub fn python_executable(host: &dyn Host) -> &'static str {
    if host.probe("python3") { "python3" } else { "python" }
}

/// Drives one runtime kind from detection to a terminal outcome:
/// detect, and when missing, prompt → install → re-detect.
///
/// The installer's exit status is never trusted on its own; a reported
/// success that re-detection cannot confirm is `RuntimeVerificationFailed`
/// and needs a fresh terminal session, not a retry.
pub fn ensure_runtime(kind: RuntimeKind, host: &dyn Host) -> Result<Acquisition> {
    if matches!(kind, RuntimeKind::Binary | RuntimeKind::Unknown) {
        return Ok(Acquisition::Available);
    }
    if detect(kind, host) {
        return Ok(Acquisition::Available);
    }

    let question = format!("This package requires {kind}, which is not installed. Install it now?");
    if !host.confirm(&question, prompt_default_accept()) {
        return Err(NexError::RuntimeInstallDeclined(kind));
    }

    host.install(kind)
        .map_err(|reason| NexError::RuntimeInstallFailed { kind, reason })?;

    if detect(kind, host) {
        Ok(Acquisition::Verified)
    } else {
        Err(NexError::RuntimeVerificationFailed(kind))
    }
}

/// Manual installation hints, shown when automatic installation is declined
/// or unavailable.
pub fn install_instructions(kind: RuntimeKind) -> &'static str {
    match kind {
        RuntimeKind::Python => {
            if cfg!(windows) {
                "Visit https://www.python.org/downloads/ or run: winget install Python.Python.3.12"
            } else if cfg!(target_os = "macos") {
                "Run: brew install python3"
            } else {
                "Run: sudo apt install python3 python3-pip (or the dnf/pacman equivalent)"
            }
        }
        RuntimeKind::Node => {
            if cfg!(windows) {
                "Visit https://nodejs.org/ or run: winget install OpenJS.NodeJS.LTS"
            } else if cfg!(target_os = "macos") {
                "Run: brew install node"
            } else {
                "Run: sudo apt install nodejs npm (or the dnf/pacman equivalent)"
            }
        }
        RuntimeKind::Bash => {
            if cfg!(windows) {
                "Install Git Bash from https://git-scm.com/ or use WSL: wsl --install"
            } else {
                "Bash is usually pre-installed on Unix systems."
            }
        }
        RuntimeKind::Powershell => {
            if cfg!(windows) {
                "PowerShell is included with Windows."
            } else {
                "Run: sudo apt install powershell, or: brew install powershell"
            }
        }
        RuntimeKind::Binary | RuntimeKind::Unknown => "No runtime required.",
    }
}

/// Production host backed by real subprocesses and stdin.
pub struct SystemHost;

impl SystemHost {
    /// First host package manager found, in preference order.
    #[cfg(not(windows))]
    fn package_manager(&self) -> Option<&'static str> {
        ["apt", "dnf", "pacman", "brew"]
            .into_iter()
            .find(|m| self.probe(m))
    }

    #[cfg(not(windows))]
    fn install_args(manager: &str, kind: RuntimeKind) -> Option<Vec<&'static str>> {
        let packages: &[&'static str] = match (manager, kind) {
            ("apt" | "dnf", RuntimeKind::Python) => &["python3", "python3-pip"],
            ("pacman", RuntimeKind::Python) => &["python", "python-pip"],
            ("brew", RuntimeKind::Python) => &["python3"],
            ("apt" | "dnf" | "pacman", RuntimeKind::Node) => &["nodejs", "npm"],
            ("brew", RuntimeKind::Node) => &["node"],
            ("apt" | "dnf" | "pacman", RuntimeKind::Bash) => &["bash"],
            ("brew", RuntimeKind::Bash) => &["bash"],
            ("apt" | "brew", RuntimeKind::Powershell) => &["powershell"],
            _ => return None,
        };

        let mut args: Vec<&'static str> = match manager {
            "apt" => vec!["sudo", "apt", "install", "-y"],
            "dnf" => vec!["sudo", "dnf", "install", "-y"],
            "pacman" => vec!["sudo", "pacman", "-S", "--noconfirm"],
            "brew" => vec!["brew", "install"],
            _ => return None,
        };
        args.extend_from_slice(packages);
        Some(args)
    }

    /// Downloads and runs the official installer. Windows only.
    #[cfg(windows)]
    fn install_via_download(&self, kind: RuntimeKind) -> std::result::Result<(), String> {
        let (url, installer_args): (&str, &[&str]) = match kind {
            RuntimeKind::Python => (
                "https://www.python.org/ftp/python/3.12.0/python-3.12.0-amd64.exe",
                &["/quiet", "InstallAllUsers=0", "PrependPath=1", "Include_test=0"],
            ),
            RuntimeKind::Node => (
                "https://nodejs.org/dist/v20.10.0/node-v20.10.0-x64.msi",
                &["/quiet", "/norestart"],
            ),
            _ => {
                return Err(format!(
                    "automatic installation is not supported for {kind} on Windows"
                ));
            }
        };

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("nex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| e.to_string())?;
        let bytes = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| format!("installer download failed: {e}"))?;

        let file_name = url.rsplit('/').next().unwrap_or("installer.exe");
        let installer = std::env::temp_dir().join(file_name);
        std::fs::write(&installer, &bytes).map_err(|e| e.to_string())?;

        let status = if file_name.ends_with(".msi") {
            Command::new("msiexec")
                .arg("/i")
                .arg(&installer)
                .args(installer_args)
                .status()
        } else {
            Command::new(&installer).args(installer_args).status()
        };
        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => Err(format!("installer exited with {s}")),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Host for SystemHost {
    fn probe(&self, program: &str) -> bool {
        Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn version_output(&self, program: &str, flag: &str) -> Option<String> {
        let output = Command::new(program)
            .arg(flag)
            .stdin(Stdio::null())
            .output()
            .ok()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Some(text)
    }

    fn confirm(&self, question: &str, default_yes: bool) -> bool {
        let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
        print!("{question} {hint} ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return default_yes;
        }
        let answer = answer.trim();
        if default_yes {
            !answer.eq_ignore_ascii_case("n")
        } else {
            answer.eq_ignore_ascii_case("y")
        }
    }

    #[cfg(not(windows))]
    fn install(&self, kind: RuntimeKind) -> std::result::Result<(), String> {
        let manager = self
            .package_manager()
            .ok_or_else(|| "could not detect a host package manager".to_string())?;
        let args = Self::install_args(manager, kind)
            .ok_or_else(|| format!("automatic installation is not supported for {kind} via {manager}"))?;

        log::info!("installing {kind} via {manager}");
        let status = Command::new(args[0])
            .args(&args[1..])
            .status()
            .map_err(|e| e.to_string())?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{manager} exited with {status}"))
        }
    }

    #[cfg(windows)]
    fn install(&self, kind: RuntimeKind) -> std::result::Result<(), String> {
        self.install_via_download(kind)
    }
}
