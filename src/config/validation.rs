//! Structural validation of a dotfiles repository.
//!
//! Findings are values, not errors: every validator returns a list of
//! [`ValidationIssue`]s so `validate` can print all of them before deciding
//! on an exit status.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use super::links::{self, ResolvedLink};
use super::packages::{BrewFile, MasFile, PackageSet};
use super::root::RootConfig;
use super::tool::ToolConfig;
use super::variables::Variables;
use super::{DotfilesRepo, ROOT_CONFIG_FILE, toml_loader};
use crate::resources::helpers::fs::is_executable;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Always fails validation.
    Error,
    /// Fails validation only under `--strict`.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Error or warning.
    pub severity: Severity,
    /// Repository-relative file the finding concerns.
    pub file: String,
    /// The specific item that triggered it.
    pub item: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    /// Create an error-level finding.
    #[must_use]
    pub fn error(
        file: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            file: file.into(),
            item: item.into(),
            message: message.into(),
        }
    }

    /// Create a warning-level finding.
    #[must_use]
    pub fn warning(
        file: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(file, item, message)
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.file, self.item, self.message)
    }
}

/// Trait for declaration validators.
pub trait Validator {
    /// Check the declarations and return every finding.
    fn validate(&self) -> Vec<ValidationIssue>;

    /// Short name used in debug output (e.g. "root", "packages").
    fn name(&self) -> &'static str;
}

/// Checks the root declaration.
#[derive(Debug)]
pub struct RootValidator<'a> {
    config: &'a RootConfig,
    tools: &'a [String],
}

impl<'a> RootValidator<'a> {
    /// Validate `config` against the repository's tool names.
    #[must_use]
    pub const fn new(config: &'a RootConfig, tools: &'a [String]) -> Self {
        Self { config, tools }
    }
}

impl Validator for RootValidator<'_> {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Err(e) = self.config.settings.strategy() {
            issues.push(ValidationIssue::error(
                ROOT_CONFIG_FILE,
                "settings.conflict_strategy",
                e.to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for profile in &self.config.profiles {
            if !seen.insert(profile.name.as_str()) {
                issues.push(ValidationIssue::error(
                    ROOT_CONFIG_FILE,
                    &profile.name,
                    "duplicate profile name",
                ));
            }
            for tool in &profile.tools {
                if !self.tools.contains(tool) {
                    issues.push(ValidationIssue::warning(
                        ROOT_CONFIG_FILE,
                        &profile.name,
                        format!("profile references unknown tool '{tool}'"),
                    ));
                }
            }
        }

        let defaults: Vec<&str> = self
            .config
            .profiles
            .iter()
            .filter(|p| p.default)
            .map(|p| p.name.as_str())
            .collect();
        if defaults.len() > 1 {
            issues.push(ValidationIssue::error(
                ROOT_CONFIG_FILE,
                "profile",
                format!("multiple default profiles: {}", defaults.join(", ")),
            ));
        }

        for tool in &self.config.preinstall.tools {
            if !self.tools.contains(tool) {
                issues.push(ValidationIssue::warning(
                    ROOT_CONFIG_FILE,
                    "preinstall.tools",
                    format!("unknown tool '{tool}'"),
                ));
            }
        }

        issues
    }

    fn name(&self) -> &'static str {
        "root"
    }
}

/// Checks the package lists for duplicates and empty names.
#[derive(Debug)]
pub struct PackageValidator<'a> {
    packages: &'a PackageSet,
    brew_file: String,
    mas_file: String,
}

impl<'a> PackageValidator<'a> {
    /// Validate `packages`; file names are used in the findings.
    #[must_use]
    pub fn new(packages: &'a PackageSet, brew_file: &str, mas_file: &str) -> Self {
        Self {
            packages,
            brew_file: brew_file.to_string(),
            mas_file: mas_file.to_string(),
        }
    }

    fn duplicates<'n>(names: impl Iterator<Item = &'n str>) -> Vec<&'n str> {
        let mut seen = BTreeSet::new();
        let mut dups = BTreeSet::new();
        for name in names {
            if !seen.insert(name) {
                dups.insert(name);
            }
        }
        dups.into_iter().collect()
    }
}

impl Validator for PackageValidator<'_> {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (kind, list) in [("formula", &self.packages.formulae), ("cask", &self.packages.casks)] {
            for dup in Self::duplicates(list.iter().map(|p| p.name.as_str())) {
                issues.push(ValidationIssue::warning(
                    &self.brew_file,
                    dup,
                    format!("duplicate {kind}"),
                ));
            }
            for p in list.iter().filter(|p| p.name.trim().is_empty()) {
                issues.push(ValidationIssue::warning(
                    &self.brew_file,
                    &p.description,
                    format!("{kind} name is empty"),
                ));
            }
        }

        let ids: Vec<String> = self.packages.apps.iter().map(|a| a.id.to_string()).collect();
        for dup in Self::duplicates(ids.iter().map(String::as_str)) {
            issues.push(ValidationIssue::warning(
                &self.mas_file,
                dup,
                "duplicate app id",
            ));
        }

        issues
    }

    fn name(&self) -> &'static str {
        "packages"
    }
}

/// Checks a single tool declaration.
#[derive(Debug)]
pub struct ToolValidator<'a> {
    name: &'a str,
    root: &'a Path,
    declaration: &'a ToolConfig,
    vars: &'a Variables,
    file: String,
    tools: &'a [String],
}

impl<'a> ToolValidator<'a> {
    /// Validate `declaration` for the tool `name` rooted at `root`.
    #[must_use]
    pub fn new(
        name: &'a str,
        root: &'a Path,
        declaration: &'a ToolConfig,
        vars: &'a Variables,
        tools: &'a [String],
    ) -> Self {
        Self {
            name,
            root,
            declaration,
            vars,
            file: format!("config/{name}/{ROOT_CONFIG_FILE}"),
            tools,
        }
    }
}

impl Validator for ToolValidator<'_> {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let decl = self.declaration;

        if let Some(declared) = &decl.tool.name
            && declared != self.name
        {
            issues.push(ValidationIssue::warning(
                &self.file,
                "tool.name",
                format!("name '{declared}' does not match directory '{}'", self.name),
            ));
        }

        for dep in &decl.tool.dependencies {
            if !self.tools.contains(dep) {
                issues.push(ValidationIssue::warning(
                    &self.file,
                    "tool.dependencies",
                    format!("unknown tool '{dep}'"),
                ));
            }
        }

        for (i, link) in decl.links.iter().enumerate() {
            if link.target.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    &self.file,
                    format!("link[{i}]"),
                    "link target is empty",
                ));
            }
        }

        for link in links::candidates(self.name, Some(decl), self.root, self.vars) {
            if !link.source.exists() {
                issues.push(ValidationIssue::warning(
                    &self.file,
                    link.target.display().to_string(),
                    format!("link source does not exist: {}", link.source.display()),
                ));
            }
        }

        let scripts_dir = self.root.join(&decl.scripts.directory);
        for item in &decl.scripts.scripts {
            let path = scripts_dir.join(item.file());
            if !path.is_file() {
                issues.push(ValidationIssue::error(
                    &self.file,
                    item.file(),
                    format!("script not found: {}", path.display()),
                ));
            } else if !is_executable(&path) {
                issues.push(ValidationIssue::warning(
                    &self.file,
                    item.file(),
                    "script is not executable",
                ));
            }
        }

        issues
    }

    fn name(&self) -> &'static str {
        "tool"
    }
}

/// Checks that no two tools link to the same target.
#[derive(Debug)]
pub struct OverlapValidator<'a> {
    links: &'a [(String, ResolvedLink)],
}

impl<'a> OverlapValidator<'a> {
    /// Validate `(tool, link)` pairs from every tool.
    #[must_use]
    pub const fn new(links: &'a [(String, ResolvedLink)]) -> Self {
        Self { links }
    }
}

impl Validator for OverlapValidator<'_> {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut owners: BTreeMap<&Path, Vec<&str>> = BTreeMap::new();
        for (tool, link) in self.links {
            owners.entry(link.target.as_path()).or_default().push(tool);
        }
        owners
            .into_iter()
            .filter(|(_, tools)| tools.len() > 1)
            .map(|(target, tools)| {
                ValidationIssue::warning(
                    "config",
                    target.display().to_string(),
                    format!(
                        "target declared by multiple tools: {} (last one wins)",
                        tools.join(", ")
                    ),
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "overlap"
    }
}

/// All findings for a repository.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Findings in discovery order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Error-level findings.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warning-level findings.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Whether validation passes; `strict` promotes warnings to errors.
    #[must_use]
    pub fn passed(&self, strict: bool) -> bool {
        self.error_count() == 0 && (!strict || self.warning_count() == 0)
    }
}

/// Load every declaration in `repo` and run all validators.
///
/// Parse failures are reported as error-level findings rather than aborting,
/// so one malformed tool does not hide problems elsewhere.
#[must_use]
pub fn validate_repo(repo: &DotfilesRepo, home: &Path) -> ValidationReport {
    let mut issues = Vec::new();

    let root_config = repo.load_root_config().unwrap_or_else(|e| {
        issues.push(ValidationIssue::error(ROOT_CONFIG_FILE, "parse", e.to_string()));
        RootConfig::default()
    });
    let vars = Variables::resolve(&root_config.settings, home);

    let tools = repo.list_tools().unwrap_or_else(|e| {
        issues.push(ValidationIssue::error("config", "list", e.to_string()));
        Vec::new()
    });

    run(&RootValidator::new(&root_config, &tools), &mut issues);

    let brew_file = repo.relative(&repo.brew_file_path());
    let mas_file = repo.relative(&repo.mas_file_path());
    let brew: BrewFile = toml_loader::load_config(&repo.brew_file_path()).unwrap_or_else(|e| {
        issues.push(ValidationIssue::error(&brew_file, "parse", e.to_string()));
        BrewFile::default()
    });
    let mas: MasFile = toml_loader::load_config(&repo.mas_file_path()).unwrap_or_else(|e| {
        issues.push(ValidationIssue::error(&mas_file, "parse", e.to_string()));
        MasFile::default()
    });
    let packages = PackageSet {
        formulae: brew.formulae,
        casks: brew.casks,
        apps: mas.apps,
    };
    run(
        &PackageValidator::new(&packages, &brew_file, &mas_file),
        &mut issues,
    );

    let mut all_links = Vec::new();
    for tool in &tools {
        let root = repo.tool_root(tool);
        let declaration = match repo.load_tool_config(tool) {
            Ok(d) => d,
            Err(e) => {
                issues.push(ValidationIssue::error(
                    repo.relative(&repo.tool_config_path(tool)),
                    "parse",
                    e.to_string(),
                ));
                continue;
            }
        };
        if let Some(decl) = &declaration {
            run(&ToolValidator::new(tool, &root, decl, &vars, &tools), &mut issues);
        }
        all_links.extend(
            links::resolve(tool, declaration.as_ref(), &root, &vars)
                .into_iter()
                .map(|l| (tool.clone(), l)),
        );
    }
    run(&OverlapValidator::new(&all_links), &mut issues);

    ValidationReport { issues }
}

fn run(validator: &dyn Validator, issues: &mut Vec<ValidationIssue>) {
    let found = validator.validate();
    tracing::debug!("validator {}: {} finding(s)", validator.name(), found.len());
    issues.extend(found);
}
