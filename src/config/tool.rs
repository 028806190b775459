//! Per-tool declaration (`config/<tool>/merlin.toml`).
use serde::{Deserialize, Serialize};

/// Default name of a tool's script directory.
pub const DEFAULT_SCRIPTS_DIR: &str = "scripts";

/// Parsed tool declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// `[tool]` table.
    pub tool: ToolMeta,
    /// Repeated `[[link]]` tables, in declaration order.
    #[serde(rename = "link")]
    pub links: Vec<LinkDecl>,
    /// `[scripts]` table.
    pub scripts: ScriptsSection,
}

/// Tool metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolMeta {
    /// Declared name; should match the directory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    pub description: String,
    /// Names of tools this one depends on.
    pub dependencies: Vec<String>,
}

/// A declared link: either a single `source -> target` pair or a base
/// target with a list of files beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkDecl {
    /// Source relative to the tool root; defaults to the tool's `config/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Templated target path (the base target when `files` is non-empty).
    pub target: String,
    /// Individual files linked under `target`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<LinkFile>,
}

/// One file of a multi-file link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFile {
    /// Source relative to the tool root.
    pub source: String,
    /// Target relative to the link's base target.
    pub target: String,
}

/// `[scripts]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsSection {
    /// Script directory relative to the tool root.
    pub directory: String,
    /// Scripts in execution order.
    pub scripts: Vec<ScriptItem>,
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            directory: DEFAULT_SCRIPTS_DIR.to_string(),
            scripts: Vec::new(),
        }
    }
}

/// A script entry: a plain file name or a `{ file, tags }` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptItem {
    /// Plain string: `"setup.sh"`.
    Simple(String),
    /// Structured: `{ file = "setup.sh", tags = ["init"] }` (`name` is
    /// accepted in place of `file`).
    Detailed {
        /// File name relative to the script directory.
        #[serde(alias = "name")]
        file: String,
        /// Tags used to select a subset of scripts.
        #[serde(default)]
        tags: Vec<String>,
    },
}

impl ScriptItem {
    /// File name relative to the script directory.
    #[must_use]
    pub fn file(&self) -> &str {
        match self {
            Self::Simple(file) | Self::Detailed { file, .. } => file,
        }
    }

    /// Tags attached to this script (empty for the plain form).
    #[must_use]
    pub fn tags(&self) -> &[String] {
        match self {
            Self::Simple(_) => &[],
            Self::Detailed { tags, .. } => tags,
        }
    }

    /// Whether this script is selected by `filter`.
    ///
    /// An empty filter selects everything; otherwise the script must carry
    /// at least one of the requested tags.
    #[must_use]
    pub fn matches_tags(&self, filter: &[String]) -> bool {
        filter.is_empty() || self.tags().iter().any(|t| filter.contains(t))
    }
}
