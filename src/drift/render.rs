//! Human-readable and JSON renderings of a [`DiffReport`].
use std::fmt::Write as _;

use super::{DiffReport, PackageDiff, ScriptDiff, SymlinkDiff};

/// Render `report` as sectioned text, one section per requested category.
#[must_use]
pub fn human(report: &DiffReport) -> String {
    let mut out = String::new();
    for (title, diff) in [
        ("Brew Formulae", &report.formulae),
        ("Brew Casks", &report.casks),
        ("MAS Apps", &report.mas),
    ] {
        if let Some(diff) = diff {
            section(&mut out, title);
            packages(&mut out, diff);
        }
    }
    if let Some(diff) = &report.symlinks {
        section(&mut out, "Symlinks");
        symlinks(&mut out, diff);
    }
    if let Some(diff) = &report.scripts {
        section(&mut out, "Scripts");
        scripts(&mut out, diff);
    }
    match report.drift_count() {
        0 => out.push_str("No drift detected.\n"),
        n => writeln!(out, "{n} difference(s) found.").unwrap_or(()),
    }
    out
}

/// Render `report` as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn json(report: &DiffReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn section(out: &mut String, title: &str) {
    writeln!(out, "== {title} ==").unwrap_or(());
}

fn in_sync(out: &mut String) {
    out.push_str("  in sync\n");
}

fn packages(out: &mut String, diff: &PackageDiff) {
    if diff.is_empty() {
        return in_sync(out);
    }
    for name in &diff.added {
        writeln!(out, "  + {name} (installed, not declared)").unwrap_or(());
    }
    for name in &diff.missing {
        writeln!(out, "  - {name} (declared, not installed)").unwrap_or(());
    }
}

fn symlinks(out: &mut String, diff: &SymlinkDiff) {
    if diff.is_empty() {
        return in_sync(out);
    }
    for (label, paths) in [
        ("missing", &diff.missing),
        ("broken", &diff.broken),
        ("divergent", &diff.divergent),
        ("orphaned", &diff.orphaned),
    ] {
        for path in paths {
            writeln!(out, "  {label:<10} {path}").unwrap_or(());
        }
    }
}

fn scripts(out: &mut String, diff: &ScriptDiff) {
    if diff.is_empty() {
        return in_sync(out);
    }
    for name in &diff.added {
        writeln!(out, "  + {name} (not declared)").unwrap_or(());
    }
    for name in &diff.missing {
        writeln!(out, "  - {name} (missing or not executable)").unwrap_or(());
    }
}
