//! Command: report drift between the repository and this machine.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::{DiffOpts, GlobalOpts};
use crate::drift::{self, Categories, SystemSnapshot, render};
use crate::exec::SystemExecutor;
use crate::logging::Logger;
use crate::resources::package::SystemPackageSource;

/// Run the diff command.
///
/// Drift is reported, not treated as failure: the command succeeds
/// whatever it finds.
///
/// # Errors
///
/// Returns an error if the repository cannot be loaded or the JSON report
/// cannot be serialized.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts, opts: &DiffOpts, log: &Logger) -> Result<()> {
    let setup = if opts.json {
        CommandSetup::load(global)?
    } else {
        CommandSetup::init(global, log)?
    };
    let categories = Categories::from_flags(opts.packages, opts.configs, opts.scripts);

    let source = SystemPackageSource::new(&SystemExecutor);
    let snapshot = SystemSnapshot::capture(&setup.model, &source, categories);
    let report = drift::compute(&setup.model, &snapshot, categories);

    if opts.json {
        println!("{}", render::json(&report)?);
    } else {
        log.stage("Drift");
        print!("{}", render::human(&report));
    }
    Ok(())
}
