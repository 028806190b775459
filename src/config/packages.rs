//! Package lists for Homebrew (`config/brew/brew.toml`) and the Mac App
//! Store (`config/mas/mas.toml`).
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A Homebrew formula or cask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    /// Package name as understood by `brew`.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Grouping label used by `list`.
    pub category: String,
    /// Informational only; dependencies are not resolved.
    pub dependencies: Vec<String>,
}

/// A Mac App Store application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasApp {
    /// Numeric store identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Grouping label used by `list`.
    pub category: String,
    /// Informational only.
    pub dependencies: Vec<String>,
}

/// Contents of `brew.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrewFile {
    /// `[[formulae]]` entries.
    pub formulae: Vec<Package>,
    /// `[[casks]]` entries.
    pub casks: Vec<Package>,
}

/// Contents of `mas.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasFile {
    /// `[[apps]]` entries.
    pub apps: Vec<MasApp>,
}

/// All declared packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSet {
    /// Declared formulae.
    pub formulae: Vec<Package>,
    /// Declared casks.
    pub casks: Vec<Package>,
    /// Declared store apps.
    pub apps: Vec<MasApp>,
}

impl PackageSet {
    /// Names of declared formulae.
    #[must_use]
    pub fn formula_names(&self) -> BTreeSet<String> {
        self.formulae.iter().map(|p| p.name.clone()).collect()
    }

    /// Names of declared casks.
    #[must_use]
    pub fn cask_names(&self) -> BTreeSet<String> {
        self.casks.iter().map(|p| p.name.clone()).collect()
    }

    /// Store identifiers of declared apps, as strings.
    #[must_use]
    pub fn app_ids(&self) -> BTreeSet<String> {
        self.apps.iter().map(|a| a.id.to_string()).collect()
    }
}
