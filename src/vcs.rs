//! Auto-commit guard.
//!
//! After a mutating operation the repository is committed only when every
//! pending change lies under the operation's allow-prefixes.  Anything else
//! in the working tree belongs to the user and blocks the commit.
use git2::{IndexAddOption, Repository, Signature, Status, StatusOptions};
use std::path::Path;

use crate::error::{MerlinError, Result};

/// Fallback committer when the repository has no `user.name`/`user.email`.
const FALLBACK_NAME: &str = "merlin";
const FALLBACK_EMAIL: &str = "merlin@localhost";

/// Tools listed individually in a commit subject before it switches to a
/// count.
const MAX_LISTED_TOOLS: usize = 3;

/// Allow-prefix for a tool directory.
#[must_use]
pub fn tool_prefix(tool: &str) -> String {
    format!("{}/{tool}", crate::config::CONFIG_DIR)
}

/// Pending changes in `repo_root` outside every allow-prefix.
///
/// # Errors
///
/// Returns [`MerlinError::Git`] if the repository cannot be opened or
/// queried.
pub fn unrelated_changes(repo_root: &Path, allow: &[String]) -> Result<Vec<String>> {
    let repo = Repository::open(repo_root)?;
    pending_outside(&repo, allow)
}

fn pending_outside(repo: &Repository, allow: &[String]) -> Result<Vec<String>> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    let mut outside = Vec::new();
    for entry in statuses.iter() {
        if entry.status() == Status::CURRENT || entry.status().contains(Status::IGNORED) {
            continue;
        }
        let Some(path) = entry.path() else {
            continue;
        };
        if !allowed(Path::new(path), allow) {
            outside.push(path.to_string());
        }
    }
    outside.sort();
    Ok(outside)
}

fn allowed(path: &Path, allow: &[String]) -> bool {
    allow.iter().any(|prefix| path.starts_with(prefix))
}

/// Stage the allow-prefixes and commit them with `message`.
///
/// The commit is created even when nothing changed, so every automated
/// operation leaves a trail.
///
/// # Errors
///
/// Returns [`MerlinError::UnrelatedChanges`] without touching the index if
/// any pending path lies outside `allow`, or [`MerlinError::Git`] if a git
/// operation fails.
pub fn commit_allowed(repo_root: &Path, allow: &[String], message: &str) -> Result<git2::Oid> {
    let repo = Repository::open(repo_root)?;
    let outside = pending_outside(&repo, allow)?;
    if !outside.is_empty() {
        return Err(MerlinError::UnrelatedChanges(outside));
    }

    let mut index = repo.index()?;
    let specs: Vec<&str> = allow.iter().map(String::as_str).collect();
    index.add_all(specs.iter().copied(), IndexAddOption::DEFAULT, None)?;
    index.update_all(specs.iter().copied(), None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let signature = repo
        .signature()
        .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    tracing::debug!("committed {oid}: {message}");
    Ok(oid)
}

/// Subject for a link or unlink commit over `tools`.
///
/// `verb` is `link` or `unlink` and doubles as the conventional-commit
/// scope.
#[must_use]
pub fn tools_message(verb: &str, tools: &[String]) -> String {
    let body = match tools {
        [one] => one.clone(),
        _ if tools.len() > MAX_LISTED_TOOLS => format!(
            "{} tools ({}, \u{2026})",
            tools.len(),
            tools
                .iter()
                .take(MAX_LISTED_TOOLS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        _ if tools.is_empty() => "0 tools".to_string(),
        _ => format!("{} ({} tools)", tools.join(", "), tools.len()),
    };
    format!("chore({verb}): {verb} {body}")
}

/// Subject for a backup-index commit.
#[must_use]
pub fn backup_message(id: &str, files: usize) -> String {
    format!("chore(backup): record {id} ({files} files)")
}
