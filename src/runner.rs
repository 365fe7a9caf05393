use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::{NexError, Result};
use crate::manifest::{Manifest, RuntimeKind};
use crate::runtime::{self, Host};

pub const DEFAULT_COMMAND: &str = "default";

/// Splits the raw arguments after `nex run <package>` into a command name and
/// its arguments. A leading argument that starts with `-` is never consumed
/// as a command name; it goes to the implicit `default` command verbatim.
pub fn split_command_args(raw: &[String]) -> (&str, &[String]) {
    match raw.first() {
        Some(first) if !first.starts_with('-') => (first.as_str(), &raw[1..]),
        _ => (DEFAULT_COMMAND, raw),
    }
}

/// Builds the argument vector for a command template: interpreter prefix,
/// whitespace-split template, then caller arguments in order.
///
/// Manifests in the wild sometimes spell the interpreter inside the template
/// (`"python main.py"`); a first token naming the runtime's own interpreter
/// is replaced by the one detection picked, so such packages still run on a
/// host that only has `python3`.
pub fn build_invocation(
    kind: RuntimeKind,
    template: &str,
    args: &[String],
    host: &dyn Host,
) -> Vec<String> {
    let mut tokens = template.split_whitespace().map(String::from);
    let mut argv: Vec<String> = Vec::new();

    let interpreter = match kind {
        RuntimeKind::Python => Some(runtime::python_executable(host).to_string()),
        RuntimeKind::Node => Some("node".to_string()),
        RuntimeKind::Bash => Some("bash".to_string()),
        RuntimeKind::Powershell => Some(
            if cfg!(windows) { "powershell" } else { "pwsh" }.to_string(),
        ),
        RuntimeKind::Binary | RuntimeKind::Unknown => None,
    };

    if let Some(interpreter) = interpreter {
        let mut tokens = tokens.peekable();
        match tokens.peek() {
            Some(first) if is_interpreter_alias(kind, first) => {
                tokens.next();
                argv.push(interpreter);
            }
            // sh is not bash; a template that asks for the POSIX shell
            // keeps it instead of being prefixed with bash
            Some(first) if kind == RuntimeKind::Bash && first.as_str() == "sh" => {}
            _ => argv.push(interpreter),
        }
        argv.extend(tokens);
    } else {
        argv.extend(&mut tokens);
    }

    argv.extend(args.iter().cloned());
    argv
}

fn is_interpreter_alias(kind: RuntimeKind, token: &str) -> bool {
    match kind {
        RuntimeKind::Python => matches!(token, "python" | "python3"),
        RuntimeKind::Node => token == "node",
        RuntimeKind::Bash => token == "bash",
        RuntimeKind::Powershell => matches!(token, "pwsh" | "powershell"),
        RuntimeKind::Binary | RuntimeKind::Unknown => false,
    }
}

/// Runs a package command and returns the child's exit code.
///
/// The runtime is acquired first (see [`runtime::ensure_runtime`]), then the
/// child runs in `package_dir` and blocks the caller until it exits; no
/// timeout applies, packages are allowed to run indefinitely. The child's
/// exit status is passed through unchanged so shell scripting against nex
/// exit codes works.
pub fn execute(
    manifest: &Manifest,
    package_dir: &Path,
    command_name: &str,
    args: &[String],
    host: &dyn Host,
) -> Result<i32> {
    let template = manifest
        .command(command_name)
        .ok_or_else(|| NexError::CommandNotFound(command_name.to_string()))?;

    runtime::ensure_runtime(manifest.runtime.kind, host)?;

    let argv = build_invocation(manifest.runtime.kind, template, args, host);
    if argv.is_empty() {
        return Err(NexError::ManifestInvalid {
            id: manifest.id.clone(),
            reason: format!("command '{command_name}' has an empty template"),
        });
    }

    debug!("exec {argv:?} in {}", package_dir.display());
    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(package_dir)
        .status()?;

    // killed by a signal: no code to forward, report generic failure
    Ok(status.code().unwrap_or(101))
}
