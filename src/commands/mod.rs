//! Subcommand orchestration.
//!
//! Each command loads the repository through [`CommandSetup`], drives the
//! engines, records one summary entry per tool, and decides the exit
//! status.  Engines return data; user-facing wording lives here.
pub mod backup;
pub mod diff;
pub mod doctor;
pub mod install;
pub mod link;
pub mod list;
pub mod prompt;
pub mod run;
pub mod unlink;
pub mod validate;
pub mod version;

use anyhow::{Context as _, Result};
use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::config::{DotfilesRepo, Model, ToolModel};
use crate::error::MerlinError;
use crate::exec;
use crate::logging::Logger;
use crate::resources::backup::BackupStore;
use crate::vcs;

/// Repository, declared model and home directory shared by every command.
#[derive(Debug)]
pub struct CommandSetup {
    /// Resolved declared state.
    pub model: Model,
    /// The user's home directory.
    pub home: PathBuf,
    /// Preview only.
    pub dry_run: bool,
}

impl CommandSetup {
    /// Discover the repository and load its declarations, logging progress.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is unset, no repository is found, or any
    /// declaration fails to parse.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        log.stage("Loading repository");
        let setup = Self::load(global)?;
        let model = &setup.model;
        log.info(&format!("repository: {}", model.repo.root().display()));
        log.debug(&format!("home_dir: {}", model.variables.home_dir));
        log.debug(&format!("config_dir: {}", model.variables.config_dir));
        log.debug(&format!(
            "{} formulae, {} casks, {} apps",
            model.packages.formulae.len(),
            model.packages.casks.len(),
            model.packages.apps.len()
        ));
        log.info(&format!("loaded {} tools", model.tools.len()));
        Ok(setup)
    }

    /// Discover the repository and load its declarations without logging,
    /// for commands whose stdout must stay machine-readable.
    ///
    /// # Errors
    ///
    /// See [`CommandSetup::init`].
    pub fn load(global: &GlobalOpts) -> Result<Self> {
        let home = home_dir()?;
        let cwd = std::env::current_dir().context("reading current directory")?;
        let repo = DotfilesRepo::discover(global.root.as_deref(), &cwd)?;
        let model = repo.load_model(&home)?;
        Ok(Self {
            model,
            home,
            dry_run: global.dry_run,
        })
    }

    /// Backup store under the home directory, aware of the repository so
    /// restores never write through links into it.
    #[must_use]
    pub fn backup_store(&self) -> BackupStore {
        BackupStore::for_home(&self.home).with_merlin_dir(self.model.repo.root())
    }

    /// Look up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::UnknownTool`] if the repository has no such
    /// tool.
    pub fn tool(&self, name: &str) -> Result<&ToolModel> {
        self.model
            .tool(name)
            .ok_or_else(|| MerlinError::UnknownTool(name.to_string()).into())
    }

    /// Run the auto-commit guard when the repository enables it and the
    /// invocation did not opt out.
    ///
    /// Never fails the command: a refusal or git error is logged as a
    /// warning.
    pub fn auto_commit(&self, opt_out: bool, allow: &[String], message: &str, log: &Logger) {
        if opt_out || !self.model.root_config.settings.auto_commit {
            return;
        }
        if self.dry_run {
            log.dry_run(&format!("would commit: {message}"));
            return;
        }
        match vcs::commit_allowed(self.model.repo.root(), allow, message) {
            Ok(oid) => log.info(&format!("committed {oid}: {message}")),
            Err(MerlinError::UnrelatedChanges(paths)) => {
                log.warn("unrelated changes detected; skipping auto-commit");
                for path in &paths {
                    log.warn(&format!("  {path}"));
                }
            }
            Err(e) => log.warn(&format!("auto-commit failed: {e}")),
        }
    }
}

/// The user's home directory from `HOME`.
///
/// # Errors
///
/// Returns an error if `HOME` is unset or empty.
pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .context("HOME is not set")
}

/// Fail with "interrupted" once a cancellation signal has arrived.
///
/// # Errors
///
/// Returns an error if the user pressed Ctrl-C.
pub fn check_cancelled() -> Result<()> {
    if exec::is_cancelled() {
        anyhow::bail!("interrupted");
    }
    Ok(())
}

/// Print the summary and bail if any entry failed.
///
/// # Errors
///
/// Returns an error if one or more entries recorded a failure.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();
    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} item(s) failed");
    }
    Ok(())
}
