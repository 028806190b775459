//! Drift detection: compare the declared model with a live snapshot.
//!
//! [`compute`] is pure: identical model and snapshot always give an
//! identical [`DiffReport`].  All filesystem and package-manager reads
//! happen earlier, in [`SystemSnapshot::capture`].
pub mod render;
pub mod snapshot;

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Model;
pub use snapshot::SystemSnapshot;
use snapshot::{TargetKind, TargetProbe};

/// Which report categories to capture and show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Categories {
    /// Formulae, casks and App Store apps.
    pub packages: bool,
    /// Symlinks.
    pub configs: bool,
    /// Per-tool scripts.
    pub scripts: bool,
}

impl Categories {
    /// Every category.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            packages: true,
            configs: true,
            scripts: true,
        }
    }

    /// Categories selected by command-line flags; no flag means all.
    #[must_use]
    pub const fn from_flags(packages: bool, configs: bool, scripts: bool) -> Self {
        if !packages && !configs && !scripts {
            return Self::all();
        }
        Self {
            packages,
            configs,
            scripts,
        }
    }
}

/// Drift for one package category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDiff {
    /// Installed but not declared.
    pub added: Vec<String>,
    /// Declared but not installed.
    pub missing: Vec<String>,
}

impl PackageDiff {
    fn between(declared: &BTreeSet<String>, installed: &BTreeSet<String>) -> Self {
        Self {
            added: installed.difference(declared).cloned().collect(),
            missing: declared.difference(installed).cloned().collect(),
        }
    }

    /// Number of differences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.missing.len()
    }

    /// Whether declared and installed agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drift for declared links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymlinkDiff {
    /// Declared targets that are not linked to their source.
    pub missing: Vec<String>,
    /// Links into the repository that no tool declares.
    pub orphaned: Vec<String>,
    /// Links whose destination does not exist.
    pub broken: Vec<String>,
    /// Targets whose content differs from the source.
    pub divergent: Vec<String>,
}

impl SymlinkDiff {
    /// Number of differences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.missing.len() + self.orphaned.len() + self.broken.len() + self.divergent.len()
    }

    /// Whether every declared link is in place.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drift for per-tool scripts, each entry named `tool/script`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptDiff {
    /// Executables present in a scripts directory but not declared.
    pub added: Vec<String>,
    /// Declared scripts that are absent or not executable.
    pub missing: Vec<String>,
}

impl ScriptDiff {
    /// Number of differences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.missing.len()
    }

    /// Whether scripts agree with the declarations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drift across every requested category.  Categories that were not
/// requested are `None` and omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    /// Homebrew formulae.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formulae: Option<PackageDiff>,
    /// Homebrew casks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub casks: Option<PackageDiff>,
    /// App Store apps, by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mas: Option<PackageDiff>,
    /// Symlinks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlinks: Option<SymlinkDiff>,
    /// Scripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<ScriptDiff>,
}

impl DiffReport {
    /// Total number of differences.
    #[must_use]
    pub fn drift_count(&self) -> usize {
        [&self.formulae, &self.casks, &self.mas]
            .into_iter()
            .flatten()
            .map(PackageDiff::len)
            .sum::<usize>()
            + self.symlinks.as_ref().map_or(0, SymlinkDiff::len)
            + self.scripts.as_ref().map_or(0, ScriptDiff::len)
    }

    /// Whether anything differs.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.drift_count() > 0
    }
}

/// Compare `model` against `snapshot` for the requested categories.
#[must_use]
pub fn compute(model: &Model, snapshot: &SystemSnapshot, categories: Categories) -> DiffReport {
    let mut report = DiffReport::default();
    if categories.packages {
        report.formulae = Some(PackageDiff::between(
            &model.packages.formula_names(),
            &snapshot.formulae,
        ));
        report.casks = Some(PackageDiff::between(
            &model.packages.cask_names(),
            &snapshot.casks,
        ));
        report.mas = Some(PackageDiff::between(
            &model.packages.app_ids(),
            &snapshot.mas_apps,
        ));
    }
    if categories.configs {
        report.symlinks = Some(symlink_diff(snapshot));
    }
    if categories.scripts {
        report.scripts = Some(script_diff(snapshot));
    }
    report
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn symlink_diff(snapshot: &SystemSnapshot) -> SymlinkDiff {
    let mut missing = BTreeSet::new();
    let mut broken = BTreeSet::new();
    let mut divergent = BTreeSet::new();

    for probe in &snapshot.targets {
        let target = display(&probe.target);
        match classify(probe) {
            Some(LinkDrift::Missing) => missing.insert(target),
            Some(LinkDrift::Broken) => broken.insert(target),
            Some(LinkDrift::Divergent) => divergent.insert(target),
            None => false,
        };
    }

    let declared: BTreeSet<&Path> = snapshot.targets.iter().map(|p| p.target.as_path()).collect();
    let mut orphaned = BTreeSet::new();
    for link in &snapshot.symlinks {
        if declared.contains(link.link_path.as_path()) {
            continue;
        }
        orphaned.insert(display(&link.link_path));
        if link.broken {
            broken.insert(display(&link.link_path));
        }
    }

    SymlinkDiff {
        missing: missing.into_iter().collect(),
        orphaned: orphaned.into_iter().collect(),
        broken: broken.into_iter().collect(),
        divergent: divergent.into_iter().collect(),
    }
}

enum LinkDrift {
    Missing,
    Broken,
    Divergent,
}

/// Classify one declared link; `None` means it is in place.
///
/// A target that is a symlink to the source is in place unless the source
/// itself has gone.  Any other occupant is divergent when both sides are
/// regular files with different digests, in place when the digests agree,
/// and missing otherwise.
fn classify(probe: &TargetProbe) -> Option<LinkDrift> {
    match &probe.kind {
        TargetKind::Absent => Some(LinkDrift::Missing),
        TargetKind::Symlink { broken: true, .. } => Some(LinkDrift::Broken),
        TargetKind::Symlink {
            points_to_source: true,
            ..
        } => None,
        TargetKind::Symlink { .. } | TargetKind::File | TargetKind::Directory => {
            match (&probe.source_hash, &probe.target_hash) {
                (Some(s), Some(t)) if s == t => None,
                (Some(_), Some(_)) => Some(LinkDrift::Divergent),
                _ => Some(LinkDrift::Missing),
            }
        }
    }
}

fn script_diff(snapshot: &SystemSnapshot) -> ScriptDiff {
    let mut added = BTreeSet::new();
    let mut missing = BTreeSet::new();
    for probe in &snapshot.scripts {
        let name = format!("{}/{}", probe.tool, probe.file);
        if !probe.declared {
            added.insert(name);
        } else if !probe.exists || !probe.executable {
            missing.insert(name);
        }
    }
    ScriptDiff {
        added: added.into_iter().collect(),
        missing: missing.into_iter().collect(),
    }
}
