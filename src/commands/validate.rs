//! Command: validate repository declarations.
use anyhow::{Context as _, Result};

use super::home_dir;
use crate::cli::{GlobalOpts, ValidateOpts};
use crate::config::DotfilesRepo;
use crate::config::validation::validate_repo;
use crate::error::MerlinError;
use crate::logging::Logger;

/// Run the validate command.
///
/// # Errors
///
/// Returns [`MerlinError::ValidationFailed`] when any error is found, or
/// any warning under `--strict`.
pub fn run(global: &GlobalOpts, opts: &ValidateOpts, log: &Logger) -> Result<()> {
    let home = home_dir()?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let repo = DotfilesRepo::discover(global.root.as_deref(), &cwd)?;

    log.stage(&format!("Validating {}", repo.root().display()));
    let report = validate_repo(&repo, &home);
    for issue in report.errors() {
        log.error(&issue.to_string());
    }
    for issue in report.warnings() {
        log.warn(&issue.to_string());
    }

    let (errors, warnings) = (report.error_count(), report.warning_count());
    if errors == 0 && warnings == 0 {
        log.info("no issues found");
    } else {
        log.info(&format!("{errors} error(s), {warnings} warning(s)"));
    }

    if !report.passed(opts.strict) {
        return Err(MerlinError::ValidationFailed { errors, warnings }.into());
    }
    Ok(())
}
