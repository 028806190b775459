//! Command: run a tool's scripts.
use anyhow::Result;

use super::{CommandSetup, finish};
use crate::cli::{GlobalOpts, RunOpts};
use crate::config::ToolModel;
use crate::config::variables::Variables;
use crate::exec::SystemExecutor;
use crate::logging::{Logger, TaskStatus};
use crate::resources::script::{ScriptEnv, ScriptRunner};

/// Run `tool`'s declared scripts matching `tags` and summarize the outcome
/// as one summary entry.
pub fn run_tool_scripts(
    tool: &ToolModel,
    vars: &Variables,
    tags: &[String],
    dry_run: bool,
    verbose: bool,
    log: &Logger,
) -> (TaskStatus, Option<String>) {
    let items = tool.scripts();
    if items.iter().all(|i| !i.matches_tags(tags)) {
        return (TaskStatus::NotApplicable, Some("no scripts".to_string()));
    }
    let env = ScriptEnv::for_tool(tool, vars);
    let results = ScriptRunner::new(&SystemExecutor, log)
        .dry_run(dry_run)
        .verbose(verbose)
        .tags(tags.to_vec())
        .run(&env, items);

    if let Some(failed) = results.iter().find(|r| !r.success) {
        let reason = failed.error.clone().unwrap_or_default();
        log.error(&format!("{}/{}: {reason}", tool.name, failed.script));
        return (TaskStatus::Failed, Some(format!("{}: {reason}", failed.script)));
    }
    for r in &results {
        log.debug(&format!(
            "{}/{} finished in {:.2?}",
            tool.name, r.script, r.duration
        ));
    }
    let count = results.len();
    if dry_run {
        (TaskStatus::DryRun, Some(format!("{count} script(s)")))
    } else {
        (TaskStatus::Ok, Some(format!("{count} script(s) ran")))
    }
}

/// Run the `run` command.
///
/// # Errors
///
/// Returns an error if the repository cannot be loaded, the tool is
/// unknown, or a script fails.
pub fn run(global: &GlobalOpts, opts: &RunOpts, verbose: bool, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let tool = setup.tool(&opts.tool)?;

    log.stage(&format!("Running scripts for {}", tool.name));
    let (status, message) = run_tool_scripts(
        tool,
        &setup.model.variables,
        &opts.tags,
        setup.dry_run,
        verbose,
        log,
    );
    log.record_task(&tool.name, status, message.as_deref());
    super::check_cancelled()?;
    finish(log)
}
