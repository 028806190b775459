//! Reconciliation engines: symlinks, backups, scripts, and packages.
pub mod backup;
pub mod backup_index;
pub mod package;
pub mod script;
pub mod symlink;

/// Shared file-system helpers.
pub mod helpers {
    pub mod fs;
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::links::ResolvedLink;
use crate::error::MerlinError;

/// Policy applied when a link target is occupied by something other than
/// the correct symlink.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Leave the target alone.
    Skip,
    /// Snapshot the target into the backup store, then replace it.
    #[default]
    Backup,
    /// Replace the target without a snapshot.
    Overwrite,
    /// Ask a [`ConflictResolver`] per target.
    Interactive,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skip => "skip",
            Self::Backup => "backup",
            Self::Overwrite => "overwrite",
            Self::Interactive => "interactive",
        };
        f.write_str(s)
    }
}

impl FromStr for ConflictStrategy {
    type Err = MerlinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "backup" => Ok(Self::Backup),
            "overwrite" => Ok(Self::Overwrite),
            "interactive" => Ok(Self::Interactive),
            _ => Err(MerlinError::InvalidStrategy(s.to_string())),
        }
    }
}

/// Outcome of a per-link operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// The symlink was created (or removed, for unlink).
    Success,
    /// Deliberately left alone.
    Skipped,
    /// The operation failed.
    Error,
    /// The target already is the correct symlink.
    AlreadyLinked,
    /// The target is occupied and nothing decided how to proceed.
    Conflict,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Error => "error",
            Self::AlreadyLinked => "already_linked",
            Self::Conflict => "conflict",
        };
        f.write_str(s)
    }
}

/// Result of linking, unlinking, or inspecting one resolved link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkResult {
    /// The link operated on.
    pub link: ResolvedLink,
    /// Outcome.
    pub status: LinkStatus,
    /// Detail for skipped, conflicting, and failed items.
    pub message: Option<String>,
    /// Id of the snapshot taken before replacing the target.
    pub backup_id: Option<String>,
}

impl LinkResult {
    /// Build a result with `status` and an optional message.
    #[must_use]
    pub fn new(link: &ResolvedLink, status: LinkStatus, message: Option<String>) -> Self {
        Self {
            link: link.clone(),
            status,
            message,
            backup_id: None,
        }
    }

    /// Whether this item counts as a failure for the command's exit status.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, LinkStatus::Error)
    }
}

/// What currently occupies a link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// Nothing exists at the target.
    Absent,
    /// The target is a symlink to the declared source.
    LinkedToSource,
    /// The target is a symlink pointing somewhere else.
    SymlinkElsewhere(PathBuf),
    /// A regular file occupies the target.
    File,
    /// A real directory occupies the target.
    Directory,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "not present"),
            Self::LinkedToSource => write!(f, "linked"),
            Self::SymlinkElsewhere(dest) => write!(f, "points elsewhere ({})", dest.display()),
            Self::File => write!(f, "a regular file exists"),
            Self::Directory => write!(f, "a directory exists"),
        }
    }
}

/// Decision for a single conflicting target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the target alone.
    Skip,
    /// Snapshot, then replace.
    Backup,
    /// Replace without a snapshot.
    Overwrite,
}

/// Decides conflicts under [`ConflictStrategy::Interactive`].
pub trait ConflictResolver {
    /// Choose what to do with `link` whose target is in `state`.
    fn resolve(&self, link: &ResolvedLink, state: &TargetState) -> Resolution;
}
