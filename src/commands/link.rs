//! Command: link tool configuration into place.
use anyhow::Result;

use super::{CommandSetup, check_cancelled, finish, prompt};
use crate::cli::{GlobalOpts, LinkOpts};
use crate::config::{ToolModel, profiles};
use crate::exec::SystemExecutor;
use crate::logging::{Logger, TaskStatus};
use crate::platform::Platform;
use crate::resources::symlink::SymlinkEngine;
use crate::resources::{ConflictStrategy, LinkResult, LinkStatus};
use crate::vcs;

/// Run the link command.
///
/// # Errors
///
/// Returns an error if the repository cannot be loaded, the tool or
/// profile is unknown, the strategy is invalid, or any link failed.
pub fn run(global: &GlobalOpts, opts: &LinkOpts, verbose: bool, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let strategy = match opts.strategy {
        Some(s) => s,
        None => setup.model.root_config.settings.strategy()?,
    };
    log.debug(&format!("conflict strategy: {strategy}"));

    let tools = match &opts.tool {
        Some(name) => vec![setup.tool(name)?],
        None => select_tools(&setup, opts.profile.as_deref(), log)?,
    };

    let names = link_tools(&setup, &tools, strategy, opts.run_scripts, verbose, log)?;
    if !names.is_empty() {
        let allow: Vec<String> = names.iter().map(|n| vcs::tool_prefix(n)).collect();
        setup.auto_commit(
            opts.no_auto_commit,
            &allow,
            &vcs::tools_message("link", &names),
            log,
        );
    }
    finish(log)
}

/// Tools of the named profile, or of the profile bound to this host (or
/// the default profile), or every tool when no profile applies.  Tools
/// listed under `[preinstall]` come first.
///
/// # Errors
///
/// Returns an error if `requested` names an undeclared profile.
pub fn select_tools<'m>(
    setup: &'m CommandSetup,
    requested: Option<&str>,
    log: &Logger,
) -> Result<Vec<&'m ToolModel>> {
    let root = &setup.model.root_config;
    let hostname = if requested.is_none() && !root.profiles.is_empty() {
        Platform::detect(&SystemExecutor).hostname
    } else {
        None
    };
    let profile = profiles::resolve(root, requested, hostname.as_deref())?;
    if let Some(p) = profile {
        log.info(&format!("profile: {}", p.name));
    }

    let names: Vec<String> = setup.model.tools.iter().map(|t| t.name.clone()).collect();
    let names = profiles::filter_tools(names, profile);
    let (mut first, rest): (Vec<&ToolModel>, Vec<&ToolModel>) = names
        .iter()
        .filter_map(|n| setup.model.tool(n))
        .partition(|t| root.preinstall.tools.contains(&t.name));
    first.sort_by_key(|t| {
        root.preinstall
            .tools
            .iter()
            .position(|p| *p == t.name)
            .unwrap_or(usize::MAX)
    });
    first.extend(rest);
    Ok(first)
}

/// Link every tool in `tools` in order, recording one summary entry per
/// tool.  Returns the names of the tools processed.
///
/// # Errors
///
/// Returns an error if the user interrupts the run.
pub fn link_tools(
    setup: &CommandSetup,
    tools: &[&ToolModel],
    strategy: ConflictStrategy,
    run_scripts: bool,
    verbose: bool,
    log: &Logger,
) -> Result<Vec<String>> {
    let store = setup.backup_store();
    let resolver = prompt::PromptResolver;
    let mut engine = SymlinkEngine::new(&store);
    if strategy == ConflictStrategy::Interactive {
        if prompt::interactive() {
            engine = engine.with_resolver(&resolver);
        } else {
            log.warn("not a terminal; conflicts will be reported, not resolved");
        }
    }

    let mut processed = Vec::new();
    for tool in tools {
        check_cancelled()?;
        log.stage(&format!("Linking {}", tool.name));
        let results: Vec<LinkResult> = tool
            .links
            .iter()
            .map(|l| engine.link(l, strategy, setup.dry_run))
            .collect();
        for r in &results {
            report(r, setup.dry_run, log);
        }
        let (mut status, mut message) = summarize(&results, setup.dry_run);

        if run_scripts && status != TaskStatus::Failed {
            let (s, m) = super::run::run_tool_scripts(
                tool,
                &setup.model.variables,
                &[],
                setup.dry_run,
                verbose,
                log,
            );
            if s == TaskStatus::Failed {
                (status, message) = (s, m);
            }
        }

        log.record_task(&tool.name, status, message.as_deref());
        processed.push(tool.name.clone());
    }
    Ok(processed)
}

fn report(result: &LinkResult, dry_run: bool, log: &Logger) {
    let target = result.link.target.display();
    let detail = result
        .message
        .as_deref()
        .map_or_else(String::new, |m| format!(" ({m})"));
    match result.status {
        LinkStatus::Success if dry_run => log.dry_run(&format!("link {target}{detail}")),
        LinkStatus::Success => log.info(&format!(
            "linked {target} -> {}{detail}",
            result.link.source.display()
        )),
        LinkStatus::AlreadyLinked => log.debug(&format!("already linked: {target}")),
        LinkStatus::Skipped => log.info(&format!("skipped {target}{detail}")),
        LinkStatus::Conflict => log.warn(&format!("conflict at {target}{detail}")),
        LinkStatus::Error => log.error(&format!("failed to link {target}{detail}")),
    }
}

/// Collapse per-link results into one summary entry.
fn summarize(results: &[LinkResult], dry_run: bool) -> (TaskStatus, Option<String>) {
    if results.is_empty() {
        return (TaskStatus::NotApplicable, Some("no links".to_string()));
    }
    let count = |s: LinkStatus| results.iter().filter(|r| r.status == s).count();
    let failed = count(LinkStatus::Error);
    let changed = count(LinkStatus::Success);
    let held = count(LinkStatus::Conflict) + count(LinkStatus::Skipped);

    if failed > 0 {
        return (
            TaskStatus::Failed,
            Some(format!("{failed} of {} link(s) failed", results.len())),
        );
    }
    if dry_run && changed > 0 {
        return (TaskStatus::DryRun, Some(format!("{changed} link(s)")));
    }
    if held > 0 {
        return (TaskStatus::Skipped, Some(format!("{held} conflict(s)")));
    }
    if changed == 0 {
        return (TaskStatus::Ok, Some("already linked".to_string()));
    }
    (TaskStatus::Ok, Some(format!("{changed} linked")))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::links::ResolvedLink;
    use std::path::PathBuf;

    fn result(status: LinkStatus) -> LinkResult {
        let link = ResolvedLink {
            source: PathBuf::from("/repo/config/zsh/config/zshrc"),
            target: PathBuf::from("/h/.zshrc"),
            is_directory: false,
        };
        LinkResult::new(&link, status, None)
    }

    #[test]
    fn no_links_is_not_applicable() {
        assert_eq!(summarize(&[], false).0, TaskStatus::NotApplicable);
    }

    #[test]
    fn any_error_fails_the_tool() {
        let (status, message) = summarize(
            &[result(LinkStatus::Success), result(LinkStatus::Error)],
            false,
        );
        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(message.as_deref(), Some("1 of 2 link(s) failed"));
    }

    #[test]
    fn conflicts_are_skips() {
        let (status, _) = summarize(
            &[result(LinkStatus::AlreadyLinked), result(LinkStatus::Conflict)],
            false,
        );
        assert_eq!(status, TaskStatus::Skipped);
    }

    #[test]
    fn relink_reports_already_linked() {
        let (status, message) = summarize(&[result(LinkStatus::AlreadyLinked)], false);
        assert_eq!(status, TaskStatus::Ok);
        assert_eq!(message.as_deref(), Some("already linked"));
    }

    #[test]
    fn dry_run_changes_are_dry_run() {
        let (status, _) = summarize(&[result(LinkStatus::Success)], true);
        assert_eq!(status, TaskStatus::DryRun);
    }
}
