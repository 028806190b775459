#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
//! Integration tests for drift detection.
//!
//! Installed packages come from a fixed in-memory source so no `brew` or
//! `mas` binary is needed.

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::symlink;

use common::{TestEnv, TestEnvBuilder};
use merlin::drift::{self, Categories, SystemSnapshot, render};
use merlin::resources::ConflictStrategy;
use merlin::resources::package::PackageSource;
use merlin::resources::symlink::SymlinkEngine;

#[derive(Default)]
struct FixedPackages {
    formulae: Vec<&'static str>,
    casks: Vec<&'static str>,
    apps: Vec<&'static str>,
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(ToString::to_string).collect()
}

impl PackageSource for FixedPackages {
    fn installed_formulae(&self) -> BTreeSet<String> {
        set(&self.formulae)
    }

    fn installed_casks(&self) -> BTreeSet<String> {
        set(&self.casks)
    }

    fn installed_mas_apps(&self) -> BTreeSet<String> {
        set(&self.apps)
    }
}

const ZSH_TOOL: &str = "[[link]]\nsource = \"config/omp.toml\"\ntarget = \"{config_dir}/zsh/omp.toml\"\n";

fn env() -> TestEnv {
    TestEnvBuilder::new()
        .tool("zsh", ZSH_TOOL)
        .file("config/zsh/config/omp.toml", "theme = \"pure\"\n")
        .file("config/brew/brew.toml", "[[formulae]]\nname = \"fzf\"\n")
        .build()
}

fn link_all(env: &TestEnv) {
    let model = env.model();
    let store = env.store();
    let engine = SymlinkEngine::new(&store);
    for link in model.all_links() {
        engine.link(link, ConflictStrategy::Skip, false);
    }
}

// ---------------------------------------------------------------------------
// Scenario F: diff detects drift
// ---------------------------------------------------------------------------

#[test]
fn diff_detects_undeclared_formula() {
    let env = env();
    link_all(&env);
    let model = env.model();
    let packages = FixedPackages {
        formulae: vec!["fzf", "jq"],
        ..FixedPackages::default()
    };

    let snapshot = SystemSnapshot::capture(&model, &packages, Categories::all());
    let report = drift::compute(&model, &snapshot, Categories::all());

    let formulae = report.formulae.as_ref().unwrap();
    assert_eq!(formulae.added, vec!["jq".to_string()]);
    assert!(formulae.missing.is_empty());
    let symlinks = report.symlinks.as_ref().unwrap();
    assert!(symlinks.missing.is_empty());
    assert!(symlinks.orphaned.is_empty());
    assert_eq!(report.drift_count(), 1);

    let text = render::human(&report);
    assert!(text.contains("  + jq (installed, not declared)"));
    assert!(text.ends_with("1 difference(s) found.\n"));
}

#[test]
fn in_sync_system_reports_no_drift() {
    let env = env();
    link_all(&env);
    let model = env.model();
    let packages = FixedPackages {
        formulae: vec!["fzf"],
        ..FixedPackages::default()
    };

    let snapshot = SystemSnapshot::capture(&model, &packages, Categories::all());
    let report = drift::compute(&model, &snapshot, Categories::all());
    assert!(!report.has_drift(), "{report:?}");
    assert!(render::human(&report).ends_with("No drift detected.\n"));
}

#[test]
fn unlinked_target_is_missing() {
    let env = env();
    let model = env.model();
    let snapshot = SystemSnapshot::capture(&model, &FixedPackages::default(), Categories::all());
    let report = drift::compute(&model, &snapshot, Categories::all());

    let symlinks = report.symlinks.unwrap();
    assert_eq!(
        symlinks.missing,
        vec![env.home_path(".config/zsh/omp.toml").display().to_string()]
    );
    assert_eq!(report.formulae.unwrap().missing, vec!["fzf".to_string()]);
}

#[test]
fn edited_copy_is_divergent() {
    let env = env();
    let target = env.home_path(".config/zsh/omp.toml");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, "theme = \"local\"\n").unwrap();

    let model = env.model();
    let snapshot = SystemSnapshot::capture(&model, &FixedPackages::default(), Categories::all());
    let symlinks = drift::compute(&model, &snapshot, Categories::all())
        .symlinks
        .unwrap();
    assert_eq!(symlinks.divergent, vec![target.display().to_string()]);
    assert!(symlinks.missing.is_empty());
}

#[test]
fn undeclared_link_into_repo_is_orphaned() {
    let env = env();
    link_all(&env);
    let orphan = env.home_path(".oldrc");
    symlink(env.repo_path("config/zsh/config/gone"), &orphan).unwrap();

    let model = env.model();
    let snapshot = SystemSnapshot::capture(&model, &FixedPackages::default(), Categories::all());
    let symlinks = drift::compute(&model, &snapshot, Categories::all())
        .symlinks
        .unwrap();
    let orphan = orphan.display().to_string();
    assert_eq!(symlinks.orphaned, vec![orphan.clone()]);
    assert_eq!(symlinks.broken, vec![orphan]);
}

#[test]
fn category_filter_limits_report() {
    let env = env();
    let model = env.model();
    let categories = Categories::from_flags(true, false, false);
    let packages = FixedPackages {
        formulae: vec!["fzf"],
        casks: vec!["iterm2"],
        ..FixedPackages::default()
    };
    let snapshot = SystemSnapshot::capture(&model, &packages, categories);
    let report = drift::compute(&model, &snapshot, categories);

    assert!(report.symlinks.is_none());
    assert!(report.scripts.is_none());
    assert_eq!(report.casks.as_ref().unwrap().added, vec!["iterm2".to_string()]);

    let json: serde_json::Value = serde_json::from_str(&render::json(&report).unwrap()).unwrap();
    assert!(json.get("symlinks").is_none());
    assert_eq!(json["casks"]["added"][0], "iterm2");
}

#[test]
fn script_drift() {
    let env = TestEnvBuilder::new()
        .tool("zsh", "[scripts]\nscripts = [\"setup.sh\", \"gone.sh\"]\n")
        .script("config/zsh/scripts/setup.sh", "#!/bin/sh\n")
        .script("config/zsh/scripts/extra.sh", "#!/bin/sh\n")
        .build();
    let model = env.model();
    let categories = Categories::from_flags(false, false, true);
    let snapshot = SystemSnapshot::capture(&model, &FixedPackages::default(), categories);
    let scripts = drift::compute(&model, &snapshot, categories).scripts.unwrap();

    assert_eq!(scripts.added, vec!["zsh/extra.sh".to_string()]);
    assert_eq!(scripts.missing, vec!["zsh/gone.sh".to_string()]);
}
