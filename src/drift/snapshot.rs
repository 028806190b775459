//! Read-only capture of the live system state that drift is computed from.
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use super::Categories;
use crate::config::Model;
use crate::config::links::ResolvedLink;
use crate::resources::backup::compute_sha256;
use crate::resources::helpers::fs::{clean, is_executable, link_destination, same_location};
use crate::resources::package::PackageSource;

/// A symlink found on disk that points into the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredLink {
    /// Location of the symlink.
    pub link_path: PathBuf,
    /// Absolute, cleaned destination of the symlink.
    pub resolved_target: PathBuf,
    /// Whether the destination does not exist.
    pub broken: bool,
}

/// What occupies a declared link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// Nothing is there.
    Absent,
    /// A symlink.
    Symlink {
        /// Absolute, cleaned destination.
        destination: PathBuf,
        /// Whether it points at the declared source.
        points_to_source: bool,
        /// Whether the destination does not exist.
        broken: bool,
    },
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// Observation of one declared link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProbe {
    /// Declared target.
    pub target: PathBuf,
    /// Declared source.
    pub source: PathBuf,
    /// What occupies the target.
    pub kind: TargetKind,
    /// Digest of the source when it is a regular file.
    pub source_hash: Option<String>,
    /// Digest of the content reached through the target when it is a
    /// regular file and not already the source.
    pub target_hash: Option<String>,
}

/// Observation of one file in a tool's scripts directory, or one declared
/// script that may be missing from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptProbe {
    /// Tool the script belongs to.
    pub tool: String,
    /// File name relative to the scripts directory.
    pub file: String,
    /// Whether the declaration lists it.
    pub declared: bool,
    /// Whether the file exists.
    pub exists: bool,
    /// Whether the file has an executable bit.
    pub executable: bool,
}

/// Point-in-time view of the machine.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Installed formula names.
    pub formulae: BTreeSet<String>,
    /// Installed cask names.
    pub casks: BTreeSet<String>,
    /// Installed App Store app ids.
    pub mas_apps: BTreeSet<String>,
    /// Symlinks pointing into the repository found in the scanned
    /// directories.
    pub symlinks: Vec<DiscoveredLink>,
    /// One probe per declared link, in declaration order.
    pub targets: Vec<TargetProbe>,
    /// Declared scripts and executables present in scripts directories.
    pub scripts: Vec<ScriptProbe>,
}

impl SystemSnapshot {
    /// Capture the categories in `categories` for `model`.
    ///
    /// Package sets come from `packages`; everything else is read from the
    /// filesystem. Nothing is modified.
    #[must_use]
    pub fn capture(model: &Model, packages: &dyn PackageSource, categories: Categories) -> Self {
        let mut snapshot = Self::default();
        if categories.packages {
            snapshot.formulae = packages.installed_formulae();
            snapshot.casks = packages.installed_casks();
            snapshot.mas_apps = packages.installed_mas_apps();
        }
        if categories.configs {
            let links: Vec<&ResolvedLink> = model.all_links().collect();
            snapshot.targets = links.iter().map(|l| probe_target(l)).collect();
            snapshot.symlinks = discover_links(model.repo.root(), &scan_roots(model, &links));
        }
        if categories.scripts {
            snapshot.scripts = probe_scripts(model);
        }
        snapshot
    }
}

fn probe_target(link: &ResolvedLink) -> TargetProbe {
    let source_hash = if link.source.is_file() {
        compute_sha256(&link.source).ok()
    } else {
        None
    };
    let kind = match std::fs::symlink_metadata(&link.target) {
        Err(_) => TargetKind::Absent,
        Ok(meta) if meta.file_type().is_symlink() => {
            let destination = link_destination(&link.target).unwrap_or_default();
            TargetKind::Symlink {
                points_to_source: same_location(&destination, &link.source),
                broken: !destination.exists(),
                destination,
            }
        }
        Ok(meta) if meta.is_dir() => TargetKind::Directory,
        Ok(_) => TargetKind::File,
    };
    let linked = matches!(
        kind,
        TargetKind::Symlink {
            points_to_source: true,
            ..
        }
    );
    let target_hash = if !linked && link.target.is_file() {
        compute_sha256(&link.target).ok()
    } else {
        None
    };
    TargetProbe {
        target: link.target.clone(),
        source: link.source.clone(),
        kind,
        source_hash,
        target_hash,
    }
}

/// Directories scanned for orphans: the parent of every declared target
/// plus the resolved config and home directories. Scans are not recursive.
fn scan_roots(model: &Model, links: &[&ResolvedLink]) -> BTreeSet<PathBuf> {
    let mut roots: BTreeSet<PathBuf> = links
        .iter()
        .filter_map(|l| l.target.parent().map(clean))
        .collect();
    roots.insert(clean(Path::new(&model.variables.config_dir)));
    roots.insert(clean(Path::new(&model.variables.home_dir)));
    roots
}

fn discover_links(repo_root: &Path, roots: &BTreeSet<PathBuf>) -> Vec<DiscoveredLink> {
    let repo_root = clean(repo_root);
    let mut found: BTreeMap<PathBuf, DiscoveredLink> = BTreeMap::new();
    for root in roots {
        let Ok(entries) = scan_dir(root) else {
            continue;
        };
        for link_path in entries {
            let Ok(destination) = link_destination(&link_path) else {
                continue;
            };
            if !points_into(&destination, &repo_root) {
                continue;
            }
            found.insert(
                link_path.clone(),
                DiscoveredLink {
                    broken: !destination.exists(),
                    link_path,
                    resolved_target: destination,
                },
            );
        }
    }
    found.into_values().collect()
}

fn scan_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_symlink() {
            out.push(clean(&entry.path()));
        }
    }
    Ok(out)
}

fn points_into(destination: &Path, repo_root: &Path) -> bool {
    if destination.starts_with(repo_root) {
        return true;
    }
    match (dunce::canonicalize(destination), dunce::canonicalize(repo_root)) {
        (Ok(d), Ok(r)) => d.starts_with(r),
        _ => false,
    }
}

fn probe_scripts(model: &Model) -> Vec<ScriptProbe> {
    let mut out = Vec::new();
    for tool in &model.tools {
        let dir = tool.scripts_dir();
        let mut declared = BTreeSet::new();
        for item in tool.scripts() {
            let path = dir.join(item.file());
            declared.insert(item.file().to_string());
            out.push(ScriptProbe {
                tool: tool.name.clone(),
                file: item.file().to_string(),
                declared: true,
                exists: path.is_file(),
                executable: is_executable(&path),
            });
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut extra: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file() && is_executable(&e.path()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !declared.contains(name))
            .collect();
        extra.sort();
        out.extend(extra.into_iter().map(|file| ScriptProbe {
            tool: tool.name.clone(),
            file,
            declared: false,
            exists: true,
            executable: true,
        }));
    }
    out
}
