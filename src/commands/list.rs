//! Command: list declared packages, tools, or profiles.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ListKind, ListOpts};
use crate::config::Model;
use crate::config::packages::Package;
use crate::resources::LinkResult;
use crate::resources::symlink::SymlinkEngine;

/// Run the list command, printing one entry per line.
///
/// # Errors
///
/// Returns an error if the repository cannot be loaded.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts, opts: &ListOpts) -> Result<()> {
    let setup = CommandSetup::load(global)?;
    print!("{}", render(&setup.model, opts.kind));
    Ok(())
}

/// Render the `kind` listing of `model`.  Tool listings include the live
/// state of every declared link.
#[must_use]
pub fn render(model: &Model, kind: ListKind) -> String {
    let mut lines = Vec::new();
    match kind {
        ListKind::Brew => {
            lines.push("Formulae:".to_string());
            lines.extend(model.packages.formulae.iter().map(package_line));
            lines.push("Casks:".to_string());
            lines.extend(model.packages.casks.iter().map(package_line));
        }
        ListKind::Mas => {
            lines.extend(
                model
                    .packages
                    .apps
                    .iter()
                    .map(|a| format!("  {:<12} {}", a.id, a.name)),
            );
        }
        ListKind::Configs => {
            for tool in &model.tools {
                let description = tool
                    .declaration
                    .as_ref()
                    .map(|d| d.tool.description.as_str())
                    .filter(|d| !d.is_empty())
                    .map_or_else(String::new, |d| format!(" - {d}"));
                lines.push(format!(
                    "  {}{description} ({} link(s), {} script(s))",
                    tool.name,
                    tool.links.len(),
                    tool.scripts().len()
                ));
                lines.extend(SymlinkEngine::status_all(&tool.links).iter().map(link_line));
            }
        }
        ListKind::Profiles => {
            for p in &model.root_config.profiles {
                let mut tags = Vec::new();
                if p.default {
                    tags.push("default".to_string());
                }
                if let Some(host) = &p.hostname {
                    tags.push(format!("host {host}"));
                }
                let tags = if tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", tags.join(", "))
                };
                lines.push(format!("  {}{tags}: {}", p.name, p.tools.join(", ")));
            }
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn link_line(r: &LinkResult) -> String {
    let detail = r
        .message
        .as_deref()
        .map_or_else(String::new, |m| format!(" ({m})"));
    format!("    {:<14} {}{detail}", r.status.to_string(), r.link.target.display())
}

fn package_line(p: &Package) -> String {
    match (p.category.is_empty(), p.description.is_empty()) {
        (true, true) => format!("  {}", p.name),
        (true, false) => format!("  {} - {}", p.name, p.description),
        (false, true) => format!("  {} ({})", p.name, p.category),
        (false, false) => format!("  {} ({}) - {}", p.name, p.category, p.description),
    }
}
