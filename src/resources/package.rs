//! Package managers: installed-set queries and batch installation.
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;

use crate::exec::Executor;

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Homebrew formulae.
    BrewFormula,
    /// Homebrew casks.
    BrewCask,
    /// Mac App Store via `mas`.
    Mas,
}

impl PackageManager {
    /// The executable that must be on `PATH`.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::BrewFormula | Self::BrewCask => "brew",
            Self::Mas => "mas",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrewFormula => write!(f, "brew formulae"),
            Self::BrewCask => write!(f, "brew casks"),
            Self::Mas => write!(f, "mas apps"),
        }
    }
}

/// Installed-set providers consumed by drift detection.
///
/// Each query returns an empty set when the underlying tool is missing or
/// fails; absence is never an error.
#[cfg_attr(test, mockall::automock)]
pub trait PackageSource {
    /// Names of installed Homebrew formulae.
    fn installed_formulae(&self) -> BTreeSet<String>;
    /// Names of installed Homebrew casks.
    fn installed_casks(&self) -> BTreeSet<String>;
    /// Identifiers of installed App Store apps.
    fn installed_mas_apps(&self) -> BTreeSet<String>;
}

/// [`PackageSource`] backed by the real `brew` and `mas` commands.
#[derive(Debug)]
pub struct SystemPackageSource<'a> {
    executor: &'a dyn Executor,
}

impl<'a> SystemPackageSource<'a> {
    /// Query through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }

    fn query(&self, manager: PackageManager) -> BTreeSet<String> {
        get_installed_packages(manager, self.executor).unwrap_or_else(|e| {
            tracing::debug!("listing {manager} failed: {e:#}");
            BTreeSet::new()
        })
    }
}

impl PackageSource for SystemPackageSource<'_> {
    fn installed_formulae(&self) -> BTreeSet<String> {
        self.query(PackageManager::BrewFormula)
    }

    fn installed_casks(&self) -> BTreeSet<String> {
        self.query(PackageManager::BrewCask)
    }

    fn installed_mas_apps(&self) -> BTreeSet<String> {
        self.query(PackageManager::Mas)
    }
}

/// Query the full set of installed package names for a given manager.
///
/// Runs a single listing command.  A missing tool or a non-zero exit yields
/// an empty set.
///
/// # Errors
///
/// Returns an error only if the command cannot be spawned.
pub fn get_installed_packages(
    manager: PackageManager,
    executor: &dyn Executor,
) -> Result<BTreeSet<String>> {
    if !executor.which(manager.program()) {
        return Ok(BTreeSet::new());
    }
    let result = match manager {
        PackageManager::BrewFormula => {
            executor.run_unchecked("brew", &["list", "--formula", "-1"])?
        }
        PackageManager::BrewCask => executor.run_unchecked("brew", &["list", "--cask", "-1"])?,
        // `mas list` prints "<id>  <name>  (<version>)" per line.
        PackageManager::Mas => executor.run_unchecked("mas", &["list"])?,
    };
    if !result.success {
        return Ok(BTreeSet::new());
    }
    Ok(result
        .stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect())
}

/// Install `names` with `manager`.
///
/// Homebrew installs run as one command per manager; `mas` installs one app
/// per call and stops at the first failure.
///
/// # Errors
///
/// Returns an error if the tool is missing or an install command fails.
pub fn batch_install_packages(
    manager: PackageManager,
    names: &[String],
    executor: &dyn Executor,
) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    if !executor.which(manager.program()) {
        anyhow::bail!("{} is not installed", manager.program());
    }
    match manager {
        PackageManager::BrewFormula => {
            let mut args = vec!["install"];
            args.extend(names.iter().map(String::as_str));
            executor.run("brew", &args)?;
        }
        PackageManager::BrewCask => {
            let mut args = vec!["install", "--cask"];
            args.extend(names.iter().map(String::as_str));
            executor.run("brew", &args)?;
        }
        PackageManager::Mas => {
            for id in names {
                executor.run("mas", &["install", id])?;
            }
        }
    }
    Ok(())
}

/// Declared names not present in `installed`, in declaration order.
#[must_use]
pub fn missing_packages(declared: &[String], installed: &BTreeSet<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    declared
        .iter()
        .filter(|n| !installed.contains(*n) && seen.insert(n.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::MockExecutor;

    #[test]
    fn brew_list_parses_one_name_per_line() {
        let mock = MockExecutor::ok("fzf\njq\n\nripgrep\n");
        let set = get_installed_packages(PackageManager::BrewFormula, &mock).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["fzf", "jq", "ripgrep"]);
        assert_eq!(mock.calls(), vec!["brew list --formula -1"]);
    }

    #[test]
    fn mas_list_takes_leading_id() {
        let mock = MockExecutor::ok("497799835  Xcode  (15.0)\n409183694  Keynote  (13.1)\n");
        let set = get_installed_packages(PackageManager::Mas, &mock).unwrap();
        assert!(set.contains("497799835"));
        assert!(set.contains("409183694"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn missing_tool_yields_empty_set() {
        let mock = MockExecutor::with_responses(vec![]).with_which(false);
        let source = SystemPackageSource::new(&mock);
        assert!(source.installed_casks().is_empty());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn failing_listing_yields_empty_set() {
        let mock = MockExecutor::with_responses(vec![(false, "Error".to_string())]);
        let source = SystemPackageSource::new(&mock);
        assert!(source.installed_formulae().is_empty());
    }

    #[test]
    fn brew_casks_install_in_one_command() {
        let mock = MockExecutor::ok("");
        batch_install_packages(
            PackageManager::BrewCask,
            &["iterm2".to_string(), "raycast".to_string()],
            &mock,
        )
        .unwrap();
        assert_eq!(mock.calls(), vec!["brew install --cask iterm2 raycast"]);
    }

    #[test]
    fn mas_installs_each_app_and_stops_on_failure() {
        let mock = MockExecutor::with_responses(vec![
            (true, String::new()),
            (false, "not signed in".to_string()),
        ]);
        let err = batch_install_packages(
            PackageManager::Mas,
            &["1".to_string(), "2".to_string(), "3".to_string()],
            &mock,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mas"));
        assert_eq!(mock.calls(), vec!["mas install 1", "mas install 2"]);
    }

    #[test]
    fn install_without_tool_fails() {
        let mock = MockExecutor::with_responses(vec![]).with_which(false);
        assert!(batch_install_packages(PackageManager::BrewFormula, &["jq".into()], &mock).is_err());
    }

    #[test]
    fn missing_packages_keeps_order_and_dedups() {
        let installed: BTreeSet<String> = ["fzf".to_string()].into();
        let declared = vec!["jq".to_string(), "fzf".to_string(), "bat".to_string(), "jq".to_string()];
        assert_eq!(missing_packages(&declared, &installed), vec!["jq", "bat"]);
    }

    #[test]
    fn mocked_source_feeds_sets() {
        let mut source = MockPackageSource::new();
        source
            .expect_installed_formulae()
            .returning(|| ["fzf".to_string()].into());
        assert!(source.installed_formulae().contains("fzf"));
    }
}
