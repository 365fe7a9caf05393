use crate::manifest::RuntimeKind;
use thiserror::Error;

/// Errors surfaced by the core modules.
///
/// Precondition mismatches (`NotInstalled`, `NotFound`, `Ambiguous`) terminate
/// the current command only; they are reported, never retried. Store
/// corruption is *not* represented here, it is self-healed to an empty store
/// at load time.
#[derive(Debug, Error)]
pub enum NexError {
    #[error("package '{0}' not found in registry")]
    NotFound(String),
    #[error("name '{name}' is ambiguous, matches: {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
    #[error("package '{0}' is not installed")]
    NotInstalled(String),
    #[error("registry unreachable: {0}")]
    RegistryUnavailable(String),
    #[error("invalid manifest for '{id}': {reason}")]
    ManifestInvalid { id: String, reason: String },
    #[error("failed to install '{id}': {reason}")]
    InstallFailed { id: String, reason: String },
    #[error("failed to remove '{id}': {reason}")]
    RemoveFailed { id: String, reason: String },
    #[error("runtime '{0}' is not installed")]
    RuntimeMissing(RuntimeKind),
    #[error("installation of runtime '{0}' was declined")]
    RuntimeInstallDeclined(RuntimeKind),
    #[error("installation of runtime '{kind}' failed: {reason}")]
    RuntimeInstallFailed { kind: RuntimeKind, reason: String },
    #[error("runtime '{0}' was installed but is still not on PATH; restart your terminal and try again")]
    RuntimeVerificationFailed(RuntimeKind),
    #[error("package has no command named '{0}'")]
    CommandNotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NexError>;
