//! Command: remove links created by `link`.
use anyhow::Result;

use super::{CommandSetup, check_cancelled, finish};
use crate::cli::{GlobalOpts, UnlinkOpts};
use crate::config::ToolModel;
use crate::logging::{Logger, TaskStatus};
use crate::resources::symlink::SymlinkEngine;
use crate::resources::{LinkResult, LinkStatus};
use crate::vcs;

/// Run the unlink command.
///
/// Only symlinks pointing at their declared source are removed; anything
/// else at a target is reported and left alone.
///
/// # Errors
///
/// Returns an error if the repository cannot be loaded, the tool is
/// unknown, or any removal failed.
pub fn run(global: &GlobalOpts, opts: &UnlinkOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let tools: Vec<&ToolModel> = match &opts.tool {
        Some(name) => vec![setup.tool(name)?],
        None => setup.model.tools.iter().collect(),
    };

    let store = setup.backup_store();
    let engine = SymlinkEngine::new(&store);
    let mut names = Vec::new();
    for tool in tools {
        check_cancelled()?;
        log.stage(&format!("Unlinking {}", tool.name));
        let results: Vec<LinkResult> = tool
            .links
            .iter()
            .map(|l| engine.unlink(l, setup.dry_run))
            .collect();
        for r in &results {
            report(r, setup.dry_run, log);
        }
        let (status, message) = summarize(&results, setup.dry_run);
        log.record_task(&tool.name, status, message.as_deref());
        names.push(tool.name.clone());
    }

    if !names.is_empty() {
        let allow: Vec<String> = names.iter().map(|n| vcs::tool_prefix(n)).collect();
        setup.auto_commit(
            opts.no_auto_commit,
            &allow,
            &vcs::tools_message("unlink", &names),
            log,
        );
    }
    finish(log)
}

fn report(result: &LinkResult, dry_run: bool, log: &Logger) {
    let target = result.link.target.display();
    let detail = result.message.as_deref().unwrap_or_default();
    match result.status {
        LinkStatus::Success if dry_run => log.dry_run(&format!("unlink {target}")),
        LinkStatus::Success => log.info(&format!("removed {target}")),
        LinkStatus::Error => log.error(&format!("failed to unlink {target}: {detail}")),
        _ => log.debug(&format!("left {target}: {detail}")),
    }
}

fn summarize(results: &[LinkResult], dry_run: bool) -> (TaskStatus, Option<String>) {
    if results.is_empty() {
        return (TaskStatus::NotApplicable, Some("no links".to_string()));
    }
    let failed = results.iter().filter(|r| r.is_failure()).count();
    let removed = results
        .iter()
        .filter(|r| r.status == LinkStatus::Success)
        .count();
    if failed > 0 {
        (
            TaskStatus::Failed,
            Some(format!("{failed} of {} link(s) failed", results.len())),
        )
    } else if removed == 0 {
        (TaskStatus::Skipped, Some("nothing linked".to_string()))
    } else if dry_run {
        (TaskStatus::DryRun, Some(format!("{removed} link(s)")))
    } else {
        (TaskStatus::Ok, Some(format!("{removed} removed")))
    }
}

#[cfg(test)]
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
    fn foreign_targets_make_the_tool_skipped() {
        let (status, _) = summarize(&[result(LinkStatus::Skipped)], false);
        assert_eq!(status, TaskStatus::Skipped);
    }

    #[test]
    fn removals_are_ok() {
        let (status, message) = summarize(
            &[result(LinkStatus::Success), result(LinkStatus::Skipped)],
            false,
        );
        assert_eq!(status, TaskStatus::Ok);
        assert_eq!(message.as_deref(), Some("1 removed"));
    }
}
