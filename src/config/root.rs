//! Root declaration (`merlin.toml` at the repository root).
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resources::ConflictStrategy;

/// Parsed root declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    /// `[metadata]` table.
    pub metadata: Metadata,
    /// `[settings]` table.
    pub settings: Settings,
    /// `[preinstall]` table.
    pub preinstall: Preinstall,
    /// Repeated `[[profile]]` tables.
    #[serde(rename = "profile")]
    pub profiles: Vec<ProfileDecl>,
}

/// Repository metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Human-readable repository name.
    pub name: String,
}

/// Global behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Link every tool after a package install.
    pub auto_link: bool,
    /// Ask before installing packages.
    pub confirm_before_install: bool,
    /// Default conflict strategy, validated by [`Settings::strategy`].
    pub conflict_strategy: String,
    /// Template for `{home_dir}`.
    pub home_dir: String,
    /// Template for `{config_dir}`.
    pub config_dir: String,
    /// Commit declared-state changes after mutating commands.
    pub auto_commit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_link: false,
            confirm_before_install: true,
            conflict_strategy: ConflictStrategy::Backup.to_string(),
            home_dir: "~".to_string(),
            config_dir: "{home_dir}/.config".to_string(),
            auto_commit: false,
        }
    }
}

impl Settings {
    /// Parse the configured conflict strategy.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::InvalidStrategy`](crate::error::MerlinError::InvalidStrategy)
    /// for unknown values.
    pub fn strategy(&self) -> Result<ConflictStrategy> {
        self.conflict_strategy.parse()
    }
}

/// Tools to install before anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preinstall {
    /// Tool names.
    pub tools: Vec<String>,
}

/// A named subset of tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDecl {
    /// Profile name, unique within the repository.
    pub name: String,
    /// Host this profile is selected on automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Used when no profile is named and no hostname matches.
    pub default: bool,
    /// Free-form description.
    pub description: String,
    /// Tools in this profile.
    pub tools: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[metadata]
name = "my dotfiles"

[settings]
conflict_strategy = "skip"
auto_commit = true
home_dir = "/tmp/h"

[preinstall]
tools = ["brew"]

[[profile]]
name = "work"
hostname = "work-mbp"
tools = ["zsh", "git"]

[[profile]]
name = "home"
default = true
tools = ["zsh"]
"#;

    #[test]
    fn parses_all_sections() {
        let cfg: RootConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.metadata.name, "my dotfiles");
        assert_eq!(cfg.settings.strategy().unwrap(), ConflictStrategy::Skip);
        assert!(cfg.settings.auto_commit);
        assert_eq!(cfg.settings.config_dir, "{home_dir}/.config");
        assert_eq!(cfg.preinstall.tools, vec!["brew"]);
        assert_eq!(cfg.profiles.len(), 2);
        assert_eq!(cfg.profiles[0].hostname.as_deref(), Some("work-mbp"));
        assert!(cfg.profiles[1].default);
    }

    #[test]
    fn empty_file_takes_defaults() {
        let cfg: RootConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.settings, Settings::default());
        assert_eq!(cfg.settings.strategy().unwrap(), ConflictStrategy::Backup);
        assert!(cfg.settings.confirm_before_install);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg: RootConfig =
            toml::from_str("[settings]\nfancy = 1\n[extra]\nx = 2\n").unwrap();
        assert_eq!(cfg.settings, Settings::default());
    }

    #[test]
    fn invalid_strategy_is_reported() {
        let cfg: RootConfig = toml::from_str("[settings]\nconflict_strategy = \"yolo\"\n").unwrap();
        assert!(cfg.settings.strategy().is_err());
    }

    #[test]
    fn parse_serialize_parse_round_trip() {
        let first: RootConfig = toml::from_str(SAMPLE).unwrap();
        let text = toml::to_string(&first).unwrap();
        let second: RootConfig = toml::from_str(&text).unwrap();
        assert_eq!(first, second);
    }
}
