//! Command: install declared packages.
use anyhow::Result;
use std::collections::BTreeSet;

use super::{CommandSetup, check_cancelled, finish, link, prompt};
use crate::cli::{GlobalOpts, InstallTarget};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Logger, TaskStatus};
use crate::platform::Platform;
use crate::resources::package::{
    PackageManager, batch_install_packages, get_installed_packages, missing_packages,
};
use crate::vcs;

/// One batch of packages for one manager.
struct Batch {
    manager: PackageManager,
    declared: Vec<String>,
}

/// Run the install command.
///
/// # Errors
///
/// Returns an error if the repository cannot be loaded or any install
/// failed.
pub fn run(global: &GlobalOpts, target: &InstallTarget, verbose: bool, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    if !Platform::detect(&SystemExecutor).is_macos() {
        log.warn("package installs target macOS; brew and mas may be unavailable");
    }

    let packages = &setup.model.packages;
    let (batches, all) = match target {
        InstallTarget::Brew(opts) => {
            let mut batches = Vec::new();
            if !opts.casks_only {
                batches.push(Batch {
                    manager: PackageManager::BrewFormula,
                    declared: packages.formulae.iter().map(|p| p.name.clone()).collect(),
                });
            }
            if !opts.formulae_only {
                batches.push(Batch {
                    manager: PackageManager::BrewCask,
                    declared: packages.casks.iter().map(|p| p.name.clone()).collect(),
                });
            }
            (batches, opts.all)
        }
        InstallTarget::Mas(opts) => (
            vec![Batch {
                manager: PackageManager::Mas,
                declared: packages.apps.iter().map(|a| a.id.to_string()).collect(),
            }],
            opts.all,
        ),
    };

    let confirm = !all && setup.model.root_config.settings.confirm_before_install;
    for batch in &batches {
        check_cancelled()?;
        install_batch(batch, &SystemExecutor, setup.dry_run, confirm, log);
    }

    if setup.model.root_config.settings.auto_link && !log.has_failures() {
        auto_link(&setup, verbose, log)?;
    }
    finish(log)
}

fn install_batch(
    batch: &Batch,
    executor: &dyn Executor,
    dry_run: bool,
    confirm: bool,
    log: &Logger,
) {
    let name = batch.manager.to_string();
    log.stage(&format!("Installing {name}"));
    if batch.declared.is_empty() {
        log.record_task(&name, TaskStatus::NotApplicable, Some("none declared"));
        return;
    }
    let program = batch.manager.program();
    if !executor.which(program) {
        log.warn(&format!("{program} not found on PATH"));
        log.record_task(&name, TaskStatus::Skipped, Some(&format!("{program} not found")));
        return;
    }

    let installed = get_installed_packages(batch.manager, executor).unwrap_or_else(|e| {
        log.warn(&format!("could not list installed {name}: {e:#}"));
        BTreeSet::new()
    });
    let missing = missing_packages(&batch.declared, &installed);
    if missing.is_empty() {
        log.info(&format!("all {} already installed", batch.declared.len()));
        log.record_task(&name, TaskStatus::Ok, Some("up to date"));
        return;
    }

    if dry_run {
        for pkg in &missing {
            log.dry_run(&format!("install {pkg}"));
        }
        let msg = format!("{} to install", missing.len());
        log.record_task(&name, TaskStatus::DryRun, Some(&msg));
        return;
    }

    if confirm {
        if !prompt::interactive() {
            log.warn("confirmation required; pass --all to install without asking");
            log.record_task(&name, TaskStatus::Skipped, Some("not confirmed"));
            return;
        }
        if !prompt::confirm(&format!("Install {} {name}?", missing.len())) {
            log.record_task(&name, TaskStatus::Skipped, Some("declined"));
            return;
        }
    }

    log.info(&format!("installing {}", missing.join(", ")));
    match batch_install_packages(batch.manager, &missing, executor) {
        Ok(()) => {
            let msg = format!("{} installed", missing.len());
            log.record_task(&name, TaskStatus::Ok, Some(&msg));
        }
        Err(e) => {
            log.error(&format!("{name}: {e:#}"));
            log.record_task(&name, TaskStatus::Failed, Some(&format!("{e:#}")));
        }
    }
}

/// Link every selected tool with the repository's default strategy.
fn auto_link(setup: &CommandSetup, verbose: bool, log: &Logger) -> Result<()> {
    let strategy = setup.model.root_config.settings.strategy()?;
    let tools = link::select_tools(setup, None, log)?;
    let names = link::link_tools(setup, &tools, strategy, false, verbose, log)?;
    if !names.is_empty() {
        let allow: Vec<String> = names.iter().map(|n| vcs::tool_prefix(n)).collect();
        setup.auto_commit(false, &allow, &vcs::tools_message("link", &names), log);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use crate::resources::test_helpers::MockExecutor;

    fn batch(names: &[&str]) -> Batch {
        Batch {
            manager: PackageManager::BrewFormula,
            declared: names.iter().map(|n| (*n).to_string()).collect(),
        }
    }

    #[test]
    fn installs_only_missing_formulae() {
        let (log, _tmp, _guard) = isolated_logger();
        let mock = MockExecutor::with_responses(vec![
            (true, "fzf\n".to_string()),
            (true, String::new()),
        ]);
        install_batch(&batch(&["fzf", "jq"]), &mock, false, false, &log);
        assert_eq!(mock.calls(), vec!["brew list --formula -1", "brew install jq"]);
        assert_eq!(log.task_entries()[0].status, TaskStatus::Ok);
    }

    #[test]
    fn dry_run_installs_nothing() {
        let (log, _tmp, _guard) = isolated_logger();
        let mock = MockExecutor::ok("");
        install_batch(&batch(&["jq"]), &mock, true, false, &log);
        assert_eq!(mock.calls(), vec!["brew list --formula -1"]);
        assert_eq!(log.task_entries()[0].status, TaskStatus::DryRun);
    }

    #[test]
    fn up_to_date_runs_no_install() {
        let (log, _tmp, _guard) = isolated_logger();
        let mock = MockExecutor::ok("jq\n");
        install_batch(&batch(&["jq"]), &mock, false, true, &log);
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(log.task_entries()[0].message.as_deref(), Some("up to date"));
    }

    #[test]
    fn missing_tool_is_skipped() {
        let (log, _tmp, _guard) = isolated_logger();
        let mock = MockExecutor::with_responses(vec![]).with_which(false);
        install_batch(&batch(&["jq"]), &mock, false, false, &log);
        assert_eq!(log.task_entries()[0].status, TaskStatus::Skipped);
        assert!(!log.has_failures());
    }

    #[test]
    fn install_failure_is_recorded() {
        let (log, _tmp, _guard) = isolated_logger();
        let mock = MockExecutor::with_responses(vec![
            (true, String::new()),
            (false, "No available formula".to_string()),
        ]);
        install_batch(&batch(&["nope"]), &mock, false, false, &log);
        assert!(log.has_failures());
    }
}
