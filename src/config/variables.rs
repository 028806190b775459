//! Placeholder expansion for templated paths.
//!
//! Templates may reference `{home_dir}` and `{config_dir}` and may start with
//! `~`.  Expansion is purely textual: unknown placeholders are left in place
//! so that a later existence check reports them.
use std::path::{Path, PathBuf};

use super::root::Settings;

/// Resolved variable bindings used to expand templated paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    /// Expanded `{home_dir}`, also substituted for a leading `~`.
    pub home_dir: String,
    /// Expanded `{config_dir}`.
    pub config_dir: String,
}

impl Variables {
    /// Resolve bindings from the root settings.
    ///
    /// `home_dir` is expanded against the user's `home` first; `config_dir`
    /// then sees the resolved `home_dir` (for both `{home_dir}` and `~`), so
    /// the default `{home_dir}/.config` chains correctly.
    #[must_use]
    pub fn resolve(settings: &Settings, home: &Path) -> Self {
        let home = home.to_string_lossy();
        let home_dir = expand_tilde(&settings.home_dir, &home);
        let config_dir = expand_tilde(
            &settings.config_dir.replace("{home_dir}", &home_dir),
            &home_dir,
        );
        Self {
            home_dir,
            config_dir,
        }
    }

    /// Expand `template` against these bindings.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        let replaced = template
            .replace("{home_dir}", &self.home_dir)
            .replace("{config_dir}", &self.config_dir);
        expand_tilde(&replaced, &self.home_dir)
    }

    /// Expand `template` and return it as a path.
    #[must_use]
    pub fn expand_path(&self, template: &str) -> PathBuf {
        PathBuf::from(self.expand(template))
    }
}

/// Replace a leading `~/` or a lone `~` with `home`.
fn expand_tilde(s: &str, home: &str) -> String {
    if s == "~" {
        home.to_string()
    } else if let Some(rest) = s.strip_prefix("~/") {
        format!("{}/{rest}", home.trim_end_matches('/'))
    } else {
        s.to_string()
    }
}
