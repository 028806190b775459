//! Symlink engine: create and remove links under a conflict strategy.
use std::io;

use super::backup::BackupStore;
use super::helpers::fs::{
    ensure_parent_dir, link_destination, remove_existing, same_location, symlink,
};
use super::{
    ConflictResolver, ConflictStrategy, LinkResult, LinkStatus, Resolution, TargetState,
};
use crate::config::links::ResolvedLink;
use crate::error::MerlinError;

/// Creates, removes, and inspects symlinks for resolved links.
///
/// Every operation returns a per-item [`LinkResult`]; nothing here fails a
/// whole batch.
pub struct SymlinkEngine<'a> {
    store: &'a BackupStore,
    resolver: Option<&'a dyn ConflictResolver>,
}

impl std::fmt::Debug for SymlinkEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymlinkEngine")
            .field("store", &self.store)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<'a> SymlinkEngine<'a> {
    /// Engine snapshotting into `store` under the backup strategy.
    #[must_use]
    pub const fn new(store: &'a BackupStore) -> Self {
        Self {
            store,
            resolver: None,
        }
    }

    /// Use `resolver` for the interactive strategy.
    #[must_use]
    pub const fn with_resolver(mut self, resolver: &'a dyn ConflictResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Classify what currently occupies `link.target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target's metadata cannot be read for a reason
    /// other than absence.
    pub fn inspect(link: &ResolvedLink) -> io::Result<TargetState> {
        let meta = match std::fs::symlink_metadata(&link.target) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TargetState::Absent),
            Err(e) => return Err(e),
        };
        if meta.file_type().is_symlink() {
            let dest = link_destination(&link.target)?;
            return Ok(if same_location(&dest, &link.source) {
                TargetState::LinkedToSource
            } else {
                TargetState::SymlinkElsewhere(dest)
            });
        }
        Ok(if meta.is_dir() {
            TargetState::Directory
        } else {
            TargetState::File
        })
    }

    /// Make `link.target` a symlink to `link.source`.
    ///
    /// With `dry_run` the decision is reported but nothing is touched.
    #[must_use]
    pub fn link(&self, link: &ResolvedLink, strategy: ConflictStrategy, dry_run: bool) -> LinkResult {
        if !link.source.exists() {
            return LinkResult::new(
                link,
                LinkStatus::Error,
                Some(MerlinError::SourceMissing(link.source.clone()).to_string()),
            );
        }

        let state = match Self::inspect(link) {
            Ok(s) => s,
            Err(e) => return error(link, &MerlinError::io(&link.target, e)),
        };

        let resolution = match state {
            TargetState::Absent => {
                if dry_run {
                    return LinkResult::new(link, LinkStatus::Success, Some("would create".into()));
                }
                return match create(link) {
                    Ok(()) => LinkResult::new(link, LinkStatus::Success, None),
                    Err(e) => error(link, &e),
                };
            }
            TargetState::LinkedToSource => {
                return LinkResult::new(link, LinkStatus::AlreadyLinked, None);
            }
            _ => match strategy {
                ConflictStrategy::Skip => Resolution::Skip,
                ConflictStrategy::Backup => Resolution::Backup,
                ConflictStrategy::Overwrite => Resolution::Overwrite,
                ConflictStrategy::Interactive => match self.resolver {
                    Some(r) => r.resolve(link, &state),
                    None => {
                        let reason = MerlinError::Conflict {
                            target: link.target.clone(),
                            reason: state.to_string(),
                        };
                        return LinkResult::new(
                            link,
                            LinkStatus::Conflict,
                            Some(reason.to_string()),
                        );
                    }
                },
            },
        };

        match resolution {
            Resolution::Skip => LinkResult::new(link, LinkStatus::Skipped, Some(state.to_string())),
            Resolution::Overwrite if dry_run => LinkResult::new(
                link,
                LinkStatus::Success,
                Some(format!("would replace ({state})")),
            ),
            Resolution::Backup if dry_run => LinkResult::new(
                link,
                LinkStatus::Success,
                Some(format!("would back up and replace ({state})")),
            ),
            Resolution::Overwrite => match replace(link) {
                Ok(()) => LinkResult::new(link, LinkStatus::Success, Some("replaced".into())),
                Err(e) => error(link, &e),
            },
            Resolution::Backup => self.backup_and_replace(link),
        }
    }

    /// Snapshot the target, replace it, and roll back from the snapshot if
    /// the new link cannot be created.  A target that cannot be captured
    /// completely is left in place.
    fn backup_and_replace(&self, link: &ResolvedLink) -> LinkResult {
        let reason = format!("link {}", link.target.display());
        let id = match self.store.snapshot_tree(&link.target, &reason) {
            Ok(m) => m.id,
            Err(e) => {
                let message = format!("backup failed, target left in place: {e}");
                return LinkResult::new(link, LinkStatus::Error, Some(message));
            }
        };

        let mut result = match replace(link) {
            Ok(()) => LinkResult::new(link, LinkStatus::Success, Some(format!("backed up to {id}"))),
            Err(e) => {
                let mut message = e.to_string();
                match self.store.restore(&id, &[]) {
                    Ok(_) => message.push_str(&format!(" (restored from backup {id})")),
                    Err(re) => message.push_str(&format!(" (restore from {id} failed: {re})")),
                }
                LinkResult::new(link, LinkStatus::Error, Some(message))
            }
        };
        result.backup_id = Some(id);
        result
    }

    /// Remove `link.target` only if it is a symlink to `link.source`.
    ///
    /// Regular files, directories, and symlinks pointing elsewhere are never
    /// removed.
    #[must_use]
    pub fn unlink(&self, link: &ResolvedLink, dry_run: bool) -> LinkResult {
        let state = match Self::inspect(link) {
            Ok(s) => s,
            Err(e) => return error(link, &MerlinError::io(&link.target, e)),
        };
        match state {
            TargetState::Absent => skipped(link, "not present"),
            TargetState::File | TargetState::Directory => skipped(link, "not a symlink"),
            TargetState::SymlinkElsewhere(_) => skipped(link, "points elsewhere"),
            TargetState::LinkedToSource if dry_run => {
                LinkResult::new(link, LinkStatus::Success, Some("would remove".into()))
            }
            TargetState::LinkedToSource => match std::fs::remove_file(&link.target) {
                Ok(()) => LinkResult::new(link, LinkStatus::Success, None),
                Err(e) => error(link, &MerlinError::io(&link.target, e)),
            },
        }
    }

    /// Report the state of `link` without touching anything.
    #[must_use]
    pub fn status(link: &ResolvedLink) -> LinkResult {
        if !link.source.exists() {
            return LinkResult::new(
                link,
                LinkStatus::Error,
                Some(MerlinError::SourceMissing(link.source.clone()).to_string()),
            );
        }
        match Self::inspect(link) {
            Ok(TargetState::LinkedToSource) => LinkResult::new(link, LinkStatus::AlreadyLinked, None),
            Ok(TargetState::Absent) => skipped(link, "not linked"),
            Ok(state) => LinkResult::new(link, LinkStatus::Conflict, Some(state.to_string())),
            Err(e) => error(link, &MerlinError::io(&link.target, e)),
        }
    }

    /// Status of every link of a tool.
    #[must_use]
    pub fn status_all(links: &[ResolvedLink]) -> Vec<LinkResult> {
        links.iter().map(Self::status).collect()
    }
}

fn skipped(link: &ResolvedLink, why: &str) -> LinkResult {
    LinkResult::new(link, LinkStatus::Skipped, Some(why.to_string()))
}

fn error(link: &ResolvedLink, e: &MerlinError) -> LinkResult {
    LinkResult::new(link, LinkStatus::Error, Some(e.to_string()))
}

fn replace(link: &ResolvedLink) -> Result<(), MerlinError> {
    remove_existing(&link.target).map_err(|e| MerlinError::io(&link.target, e))?;
    create(link)
}

fn create(link: &ResolvedLink) -> Result<(), MerlinError> {
    ensure_parent_dir(&link.target).map_err(|e| MerlinError::io(&link.target, e))?;
    symlink(&link.source, &link.target).map_err(|e| MerlinError::io(&link.target, e))
}
