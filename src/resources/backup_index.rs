//! In-repo record of snapshots (`.merlin-meta/backups.json`), kept so the
//! auto-commit trail shows when backups were taken.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::backup::BackupManifest;
use super::helpers::fs::ensure_parent_dir;
use crate::error::{MerlinError, Result};

/// Index path relative to the repository root.
pub const INDEX_PATH: &str = ".merlin-meta/backups.json";

/// One recorded snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Snapshot id.
    pub id: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Why the snapshot was taken.
    pub reason: String,
    /// Original paths captured.
    pub files: Vec<String>,
}

/// The index document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupIndex {
    /// Entries in recording order.
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
}

impl BackupIndex {
    /// Location of the index inside `repo_root`.
    #[must_use]
    pub fn path(repo_root: &Path) -> PathBuf {
        repo_root.join(INDEX_PATH)
    }

    /// Load the index; a missing file is an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::Parse`] if the file is malformed.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = Self::path(repo_root);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| MerlinError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| MerlinError::Parse {
            path,
            message: e.to_string(),
        })
    }

    /// Add `manifest` unless an entry with its id already exists.
    /// Returns whether the index changed.
    pub fn record(&mut self, manifest: &BackupManifest) -> bool {
        if self.entries.iter().any(|e| e.id == manifest.id) {
            return false;
        }
        self.entries.push(IndexEntry {
            id: manifest.id.clone(),
            timestamp: manifest.timestamp.clone(),
            reason: manifest.reason.clone(),
            files: manifest
                .files
                .iter()
                .map(|f| f.original_path.clone())
                .collect(),
        });
        true
    }

    /// Write the index to `repo_root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, repo_root: &Path) -> Result<()> {
        let path = Self::path(repo_root);
        ensure_parent_dir(&path).map_err(|e| MerlinError::io(&path, e))?;
        let mut json = serde_json::to_string_pretty(self).map_err(|e| MerlinError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        json.push('\n');
        std::fs::write(&path, json).map_err(|e| MerlinError::io(&path, e))
    }
}

/// Load, record, and save in one step.  Returns whether the index changed.
///
/// # Errors
///
/// Propagates load and save failures.
pub fn append(repo_root: &Path, manifest: &BackupManifest) -> Result<bool> {
    let mut index = BackupIndex::load(repo_root)?;
    if !index.record(manifest) {
        return Ok(false);
    }
    index.save(repo_root)?;
    Ok(true)
}
