//! Turn declared links into concrete `(source, target, is_directory)` triples.
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::tool::ToolConfig;
use super::variables::Variables;

/// Name of the per-tool configuration directory, relative to the tool root.
pub const TOOL_CONFIG_DIR: &str = "config";

/// A declared link after variable expansion and source selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLink {
    /// Absolute path inside the repository.
    pub source: PathBuf,
    /// Absolute path where the symlink lives.
    pub target: PathBuf,
    /// Whether `source` is a directory on disk.
    pub is_directory: bool,
}

impl ResolvedLink {
    fn new(source: PathBuf, target: PathBuf) -> Self {
        let is_directory = source.is_dir();
        Self {
            source,
            target,
            is_directory,
        }
    }
}

/// Every link the tool declares, including those whose source is missing.
///
/// A tool without a declaration but with a `config/` directory gets a
/// synthesized link of that directory to `{config_dir}/<tool>`.
#[must_use]
pub fn candidates(
    tool_name: &str,
    declaration: Option<&ToolConfig>,
    tool_root: &Path,
    vars: &Variables,
) -> Vec<ResolvedLink> {
    let config_dir = tool_root.join(TOOL_CONFIG_DIR);

    let Some(decl) = declaration else {
        if config_dir.is_dir() {
            let target = vars.expand_path("{config_dir}").join(tool_name);
            return vec![ResolvedLink::new(config_dir, target)];
        }
        return Vec::new();
    };

    let mut out = Vec::new();
    for link in &decl.links {
        let target = vars.expand_path(&link.target);
        if link.files.is_empty() {
            let source = link
                .source
                .as_ref()
                .map_or_else(|| config_dir.clone(), |s| tool_root.join(s));
            out.push(ResolvedLink::new(source, target));
        } else {
            for file in &link.files {
                out.push(ResolvedLink::new(
                    tool_root.join(&file.source),
                    target.join(&file.target),
                ));
            }
        }
    }
    out
}

/// Resolve the tool's links, silently dropping those whose source is absent.
#[must_use]
pub fn resolve(
    tool_name: &str,
    declaration: Option<&ToolConfig>,
    tool_root: &Path,
    vars: &Variables,
) -> Vec<ResolvedLink> {
    candidates(tool_name, declaration, tool_root, vars)
        .into_iter()
        .filter(|l| l.source.exists())
        .collect()
}
