//! Command: manage file snapshots.
use anyhow::{Context as _, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use super::{CommandSetup, home_dir};
use crate::cli::{BackupCommand, GlobalOpts};
use crate::error::MerlinError;
use crate::logging::Logger;
use crate::resources::backup::{BackupManifest, BackupStore, CleanPolicy, EntryKind};
use crate::resources::backup_index::{self, INDEX_PATH};
use crate::vcs;

/// Run a `backup` subcommand.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written, a snapshot is
/// missing or corrupt, or no files qualify for a new snapshot.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts, command: &BackupCommand, log: &Logger) -> Result<()> {
    match command {
        BackupCommand::Create { paths, reason } => create(global, paths, reason, log),
        BackupCommand::List => {
            let store = open_store(global)?;
            print!("{}", render_list(&store.list()?));
            Ok(())
        }
        BackupCommand::Show { id } => {
            let store = open_store(global)?;
            print!("{}", render_manifest(&store.load(id)?));
            Ok(())
        }
        BackupCommand::Restore { id, files } => restore(global, id, files, log),
        BackupCommand::Delete { id } => {
            let store = open_store(global)?;
            if global.dry_run {
                store.load(id)?;
                log.dry_run(&format!("delete backup {id}"));
                return Ok(());
            }
            store.delete(id)?;
            log.info(&format!("deleted backup {id}"));
            Ok(())
        }
        BackupCommand::Clean { keep, older_than } => {
            if keep.is_none() && older_than.is_none() {
                anyhow::bail!("nothing to clean: pass --keep and/or --older-than");
            }
            let store = open_store(global)?;
            let policy = CleanPolicy {
                keep: *keep,
                older_than_days: *older_than,
            };
            let ids = store.clean(policy, Local::now(), global.dry_run)?;
            for id in &ids {
                if global.dry_run {
                    log.dry_run(&format!("delete backup {id}"));
                } else {
                    log.info(&format!("deleted backup {id}"));
                }
            }
            log.info(&format!("{} backup(s) selected", ids.len()));
            Ok(())
        }
    }
}

/// The store, aware of the repository when one can be found.  Listing and
/// restoring still work when there is no repository at all; a repository
/// that fails to load is an error.
fn open_store(global: &GlobalOpts) -> Result<BackupStore> {
    match CommandSetup::load(global) {
        Ok(setup) => Ok(setup.backup_store()),
        Err(e) if is_missing_repo(&e) => Ok(BackupStore::for_home(&home_dir()?)),
        Err(e) => Err(e),
    }
}

fn is_missing_repo(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<MerlinError>(),
        Some(MerlinError::RepoNotFound | MerlinError::NotADotfilesRepo(_))
    )
}

/// Make `path` absolute: `~` against the store's home, relative paths
/// against `cwd`.
fn absolute(store: &BackupStore, path: &Path, cwd: &Path) -> PathBuf {
    let expanded = store.expand(path);
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

fn create(global: &GlobalOpts, paths: &[PathBuf], reason: &str, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let store = setup.backup_store();
    let cwd = std::env::current_dir().context("reading current directory")?;
    let paths: Vec<PathBuf> = paths.iter().map(|p| absolute(&store, p, &cwd)).collect();

    log.stage("Creating backup");
    if setup.dry_run {
        for p in &paths {
            log.dry_run(&format!("back up {}", p.display()));
        }
        return Ok(());
    }

    let manifest = store.create(&paths, reason)?;
    log.info(&format!(
        "created backup {} ({} file(s), {} bytes)",
        manifest.id,
        manifest.files.len(),
        manifest.total_size()
    ));

    if backup_index::append(setup.model.repo.root(), &manifest)? {
        setup.auto_commit(
            false,
            &[INDEX_PATH.to_string()],
            &vcs::backup_message(&manifest.id, manifest.files.len()),
            log,
        );
    }
    Ok(())
}

fn restore(global: &GlobalOpts, id: &str, files: &[PathBuf], log: &Logger) -> Result<()> {
    let store = open_store(global)?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let only: Vec<PathBuf> = files.iter().map(|p| absolute(&store, p, &cwd)).collect();

    log.stage(&format!("Restoring backup {id}"));
    if global.dry_run {
        let manifest = store.load(id)?;
        let selected = store.verify(&manifest, &only)?;
        for entry in selected {
            log.dry_run(&format!("restore {}", entry.original_path));
        }
        return Ok(());
    }

    let restored = store.restore(id, &only)?;
    for path in &restored {
        log.info(&format!("restored {}", path.display()));
    }
    log.info(&format!("{} file(s) restored", restored.len()));
    Ok(())
}

fn render_list(manifests: &[BackupManifest]) -> String {
    if manifests.is_empty() {
        return "no backups\n".to_string();
    }
    let mut out = String::new();
    for m in manifests {
        out.push_str(&format!(
            "{:<20} {:>4} file(s) {:>10} bytes  {}\n",
            m.id,
            m.files.len(),
            m.total_size(),
            m.reason
        ));
    }
    out
}

fn render_manifest(m: &BackupManifest) -> String {
    let mut out = format!(
        "id:        {}\ntimestamp: {}\nreason:    {}\nrepo:      {}\nfiles:\n",
        m.id, m.timestamp, m.reason, m.merlin_dir
    );
    for f in &m.files {
        let line = match f.kind {
            EntryKind::File => format!(
                "  {} ({} bytes, sha256 {})\n",
                f.original_path, f.size, f.checksum
            ),
            EntryKind::Symlink => format!(
                "  {} -> {} (symlink)\n",
                f.original_path,
                f.link_target.as_deref().unwrap_or_default()
            ),
            EntryKind::Dir => format!("  {}/ (empty directory)\n", f.original_path),
        };
        out.push_str(&line);
    }
    out
}
