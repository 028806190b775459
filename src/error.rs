//! Domain-specific error types for merlin.
//!
//! The reconciliation engines return [`MerlinError`] for infrastructural
//! failures and for the per-item faults that callers need to match on.
//! Command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! Validation findings are deliberately *not* errors: they are reported as
//! [`ValidationIssue`](crate::config::validation::ValidationIssue) values so
//! that `validate` can list all of them before deciding on an exit status.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the declared-state loader and the reconciliation engines.
#[derive(Error, Debug)]
pub enum MerlinError {
    /// Repository discovery walked every ancestor without finding a repo.
    #[error("no dotfiles repository found (set MERLIN_DOTFILES or run inside one)")]
    RepoNotFound,

    /// A directory was named as the repo but lacks `merlin.toml` or `config/`.
    #[error("not a dotfiles repository: {}", .0.display())]
    NotADotfilesRepo(PathBuf),

    /// A declaration file could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Validation produced errors (or warnings under `--strict`).
    #[error("validation failed: {errors} error(s), {warnings} warning(s)")]
    ValidationFailed {
        /// Number of error-level findings.
        errors: usize,
        /// Number of warning-level findings.
        warnings: usize,
    },

    /// A declared link source does not exist.
    #[error("link source missing: {}", .0.display())]
    SourceMissing(PathBuf),

    /// A link target is occupied and the strategy did not allow replacing it.
    #[error("conflict at {}: {reason}", target.display())]
    Conflict {
        /// Occupied target path.
        target: PathBuf,
        /// Why the target was not replaced.
        reason: String,
    },

    /// The configured conflict strategy is not one of the known values.
    #[error("invalid conflict strategy '{0}': must be one of skip, backup, overwrite, interactive")]
    InvalidStrategy(String),

    /// A backup id does not exist in the backup store.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// A backup directory already exists for this id.
    #[error("backup already exists: {0}")]
    BackupExists(String),

    /// A backup request matched no regular files.
    #[error("no files to back up")]
    NoBackupFiles,

    /// A backup copy failed its integrity check during restore.
    #[error("backup {id} is corrupt: {entry}")]
    BackupCorrupt {
        /// Backup id.
        id: String,
        /// Description of the failing entry.
        entry: String,
    },

    /// The auto-commit guard found work outside the allow-prefixes.
    #[error("unrelated changes detected: {}", .0.join(", "))]
    UnrelatedChanges(Vec<String>),

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed (exit {exit_code}): {output}")]
    ExternalToolFailure {
        /// Program name.
        tool: String,
        /// Exit code, `-1` when terminated by a signal.
        exit_code: i32,
        /// Captured output.
        output: String,
    },

    /// A declared script is present but lacks the executable bit.
    #[error("script is not executable: {}", .0.display())]
    ScriptNotExecutable(PathBuf),

    /// A declared script does not exist.
    #[error("script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    /// A tool name does not correspond to a directory under `config/`.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A profile name is not declared in the root `merlin.toml`.
    #[error("unknown profile '{name}' (available: {available})")]
    UnknownProfile {
        /// Requested profile.
        name: String,
        /// Comma-separated list of declared profiles.
        available: String,
    },

    /// A libgit2 operation failed.
    #[error("git: {0}")]
    Git(#[from] git2::Error),

    /// A filesystem operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl MerlinError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for results carrying a [`MerlinError`].
pub type Result<T, E = MerlinError> = std::result::Result<T, E>;
