//! Build script that embeds version information from git.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    // A release build sets MERLIN_VERSION; local builds only know the commit.
    if let Ok(version) = std::env::var("MERLIN_VERSION") {
        println!("cargo:rustc-env=MERLIN_VERSION={version}");
    }
    if let Some(commit) = git(&["rev-parse", "--short", "HEAD"]) {
        let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some();
        let suffix = if dirty { "-dirty" } else { "" };
        println!("cargo:rustc-env=MERLIN_COMMIT={commit}{suffix}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=MERLIN_VERSION");
}
