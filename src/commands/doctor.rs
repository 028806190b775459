//! Command: check the environment and repository health.
use anyhow::{Context as _, Result};
use std::path::Path;

use super::{finish, home_dir};
use crate::cli::GlobalOpts;
use crate::config::DotfilesRepo;
use crate::config::validation::validate_repo;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Logger, TaskStatus};
use crate::platform::Platform;
use crate::resources::backup::BackupStore;

/// Run the doctor command.
///
/// Each check records one summary entry; only checks that make the tool
/// unusable count as failures.
///
/// # Errors
///
/// Returns an error if `HOME` is unset or any check failed.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let home = home_dir()?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let executor = SystemExecutor;

    log.stage("Environment");
    let platform = Platform::detect(&executor);
    if platform.is_macos() {
        log.record_task("platform", TaskStatus::Ok, Some("macos"));
    } else {
        let msg = format!("{} (package installs unavailable)", platform.os);
        log.record_task("platform", TaskStatus::Skipped, Some(&msg));
    }
    if let Some(host) = &platform.hostname {
        log.info(&format!("hostname: {host}"));
    }
    check_tools(&executor, log);
    check_backup_root(&BackupStore::for_home(&home), log);

    log.stage("Repository");
    match DotfilesRepo::discover(global.root.as_deref(), &cwd) {
        Ok(repo) => {
            let root = repo.root().display().to_string();
            log.record_task("repository", TaskStatus::Ok, Some(&root));
            check_repo(&repo, &home, log);
        }
        Err(e) => log.record_task("repository", TaskStatus::Failed, Some(&e.to_string())),
    }

    finish(log)
}

fn check_tools(executor: &dyn Executor, log: &Logger) {
    for (program, purpose) in [
        ("brew", "formulae and casks"),
        ("mas", "App Store apps"),
        ("git", "auto-commit"),
    ] {
        if executor.which(program) {
            log.record_task(program, TaskStatus::Ok, None);
        } else {
            let msg = format!("not found; needed for {purpose}");
            log.record_task(program, TaskStatus::Skipped, Some(&msg));
        }
    }
}

fn check_backup_root(store: &BackupStore, log: &Logger) {
    let root = store.root();
    if writable(root) {
        log.record_task("backup root", TaskStatus::Ok, Some(&root.display().to_string()));
    } else {
        let msg = format!("{} is not writable", root.display());
        log.record_task("backup root", TaskStatus::Failed, Some(&msg));
    }
}

/// Whether `path`, or the nearest existing ancestor it would be created
/// under, accepts writes.
fn writable(path: &Path) -> bool {
    path.ancestors()
        .find_map(|p| std::fs::metadata(p).ok())
        .is_some_and(|m| m.is_dir() && !m.permissions().readonly())
}

fn check_repo(repo: &DotfilesRepo, home: &Path, log: &Logger) {
    match repo.load_root_config() {
        Ok(_) => log.record_task("root declaration", TaskStatus::Ok, None),
        Err(e) => log.record_task("root declaration", TaskStatus::Failed, Some(&e.to_string())),
    }

    let report = validate_repo(repo, home);
    let (errors, warnings) = (report.error_count(), report.warning_count());
    for issue in &report.issues {
        log.debug(&issue.to_string());
    }
    let msg = format!("{errors} error(s), {warnings} warning(s)");
    let status = if errors > 0 {
        TaskStatus::Failed
    } else if warnings > 0 {
        TaskStatus::Skipped
    } else {
        TaskStatus::Ok
    };
    log.record_task("validation", status, Some(&msg));
}
