//! Declared state: repository discovery, declarations, and link resolution.
//!
//! A dotfiles repository is a directory holding a root `merlin.toml` and a
//! `config/` directory whose direct subdirectories are tools.  Everything
//! here is value-like and reloaded per command.
pub mod links;
pub mod packages;
pub mod profiles;
pub mod root;
pub mod tool;
pub mod toml_loader;
pub mod validation;
pub mod variables;

use std::path::{Path, PathBuf};

use crate::error::{MerlinError, Result};
use links::ResolvedLink;
use packages::{BrewFile, MasFile, PackageSet};
use root::RootConfig;
use tool::{ScriptItem, ToolConfig};
use variables::Variables;

/// File name of both the root and the per-tool declarations.
pub const ROOT_CONFIG_FILE: &str = "merlin.toml";
/// Directory holding one subdirectory per tool.
pub const CONFIG_DIR: &str = "config";
/// Environment variable overriding repository discovery.
pub const DOTFILES_ENV: &str = "MERLIN_DOTFILES";
/// Tool directory holding `brew.toml`.
pub const BREW_TOOL: &str = "brew";
/// Tool directory holding `mas.toml`.
pub const MAS_TOOL: &str = "mas";

/// A located dotfiles repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotfilesRepo {
    root: PathBuf,
}

impl DotfilesRepo {
    /// Whether `dir` carries both repository markers.
    #[must_use]
    pub fn is_repo(dir: &Path) -> bool {
        dir.join(ROOT_CONFIG_FILE).is_file() && dir.join(CONFIG_DIR).is_dir()
    }

    /// Open `dir` as a repository.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::NotADotfilesRepo`] if `dir` lacks the markers.
    pub fn open(dir: &Path) -> Result<Self> {
        if !Self::is_repo(dir) {
            return Err(MerlinError::NotADotfilesRepo(dir.to_path_buf()));
        }
        let root = dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        Ok(Self { root })
    }

    /// Wrap `root` without checking the markers.
    #[cfg(test)]
    pub(crate) const fn new_unchecked(root: PathBuf) -> Self {
        Self { root }
    }

    /// Locate a repository from an explicit override or by walking up from
    /// `cwd`.
    ///
    /// While walking, a directory whose parent is named `config` is skipped
    /// so a tool directory carrying its own `merlin.toml` and `config/` is
    /// never mistaken for the repository root.  A genuine repository whose
    /// parent happens to be named `config` is skipped too.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::NotADotfilesRepo`] for an invalid override and
    /// [`MerlinError::RepoNotFound`] once every ancestor has been tried.
    pub fn locate(override_dir: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Self::open(dir);
        }
        for dir in cwd.ancestors() {
            let inside_config = dir
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|n| n == CONFIG_DIR);
            if inside_config {
                continue;
            }
            if Self::is_repo(dir) {
                return Self::open(dir);
            }
        }
        Err(MerlinError::RepoNotFound)
    }

    /// Locate the repository for this process: `explicit` (from `--root`),
    /// then `$MERLIN_DOTFILES`, then the current directory and its ancestors.
    ///
    /// # Errors
    ///
    /// See [`DotfilesRepo::locate`].
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let from_env = std::env::var_os(DOTFILES_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::locate(explicit.or(from_env.as_deref()), cwd)
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the root declaration.
    #[must_use]
    pub fn root_config_path(&self) -> PathBuf {
        self.root.join(ROOT_CONFIG_FILE)
    }

    /// The `config/` directory.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    /// Root directory of `tool`.
    #[must_use]
    pub fn tool_root(&self, tool: &str) -> PathBuf {
        self.config_dir().join(tool)
    }

    /// Path of `tool`'s declaration file.
    #[must_use]
    pub fn tool_config_path(&self, tool: &str) -> PathBuf {
        self.tool_root(tool).join(ROOT_CONFIG_FILE)
    }

    /// Path relative to the repository root, with `/` separators.
    #[must_use]
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Every direct subdirectory of `config/`, in directory enumeration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if `config/` cannot be read.
    pub fn list_tools(&self) -> Result<Vec<String>> {
        let dir = self.config_dir();
        let entries = std::fs::read_dir(&dir).map_err(|e| MerlinError::io(&dir, e))?;
        let mut tools = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MerlinError::io(&dir, e))?;
            if entry.path().is_dir() {
                tools.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(tools)
    }

    /// Parse the root declaration.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::Parse`] if the file is malformed.
    pub fn load_root_config(&self) -> Result<RootConfig> {
        toml_loader::load_config(&self.root_config_path())
    }

    /// Parse `tool`'s declaration, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::Parse`] if the file is malformed.
    pub fn load_tool_config(&self, tool: &str) -> Result<Option<ToolConfig>> {
        toml_loader::load_optional(&self.tool_config_path(tool))
    }

    /// Path of the Homebrew package list.
    #[must_use]
    pub fn brew_file_path(&self) -> PathBuf {
        self.tool_root(BREW_TOOL).join("brew.toml")
    }

    /// Path of the App Store package list.
    #[must_use]
    pub fn mas_file_path(&self) -> PathBuf {
        self.tool_root(MAS_TOOL).join("mas.toml")
    }

    /// Parse both package lists; absent files mean empty lists.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::Parse`] if either file is malformed.
    pub fn load_packages(&self) -> Result<PackageSet> {
        let brew: BrewFile = toml_loader::load_config(&self.brew_file_path())?;
        let mas: MasFile = toml_loader::load_config(&self.mas_file_path())?;
        Ok(PackageSet {
            formulae: brew.formulae,
            casks: brew.casks,
            apps: mas.apps,
        })
    }

    /// Load one tool and resolve its links.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::UnknownTool`] if the tool directory does not
    /// exist, or [`MerlinError::Parse`] for a malformed declaration.
    pub fn load_tool(&self, tool: &str, vars: &Variables) -> Result<ToolModel> {
        let root = self.tool_root(tool);
        if tool.is_empty() || !root.is_dir() {
            return Err(MerlinError::UnknownTool(tool.to_string()));
        }
        let declaration = self.load_tool_config(tool)?;
        let links = links::resolve(tool, declaration.as_ref(), &root, vars);
        Ok(ToolModel {
            name: tool.to_string(),
            config_dir: root.join(links::TOOL_CONFIG_DIR),
            root,
            declaration,
            links,
        })
    }

    /// Load the complete declared model with variables resolved against
    /// `home`.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure encountered.
    pub fn load_model(&self, home: &Path) -> Result<Model> {
        let root_config = self.load_root_config()?;
        let variables = Variables::resolve(&root_config.settings, home);
        let tools = self
            .list_tools()?
            .iter()
            .map(|t| self.load_tool(t, &variables))
            .collect::<Result<Vec<_>>>()?;
        let packages = self.load_packages()?;
        Ok(Model {
            repo: self.clone(),
            root_config,
            variables,
            tools,
            packages,
        })
    }
}

/// The resolved declared state of a repository.
#[derive(Debug, Clone)]
pub struct Model {
    /// Repository the model was loaded from.
    pub repo: DotfilesRepo,
    /// Root declaration.
    pub root_config: RootConfig,
    /// Resolved variable bindings.
    pub variables: Variables,
    /// Tools in enumeration order.
    pub tools: Vec<ToolModel>,
    /// Declared packages.
    pub packages: PackageSet,
}

impl Model {
    /// Look up a tool by name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolModel> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Every resolved link of every tool.
    pub fn all_links(&self) -> impl Iterator<Item = &ResolvedLink> {
        self.tools.iter().flat_map(|t| t.links.iter())
    }
}

/// One tool with its declaration and resolved links.
#[derive(Debug, Clone)]
pub struct ToolModel {
    /// Directory name under `config/`.
    pub name: String,
    /// Tool root directory.
    pub root: PathBuf,
    /// The tool's own `config/` directory.
    pub config_dir: PathBuf,
    /// Parsed declaration, absent when the tool has no `merlin.toml`.
    pub declaration: Option<ToolConfig>,
    /// Links with existing sources, in declaration order.
    pub links: Vec<ResolvedLink>,
}

impl ToolModel {
    /// Directory scripts are run from.
    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        let dir = self
            .declaration
            .as_ref()
            .map_or(tool::DEFAULT_SCRIPTS_DIR, |d| d.scripts.directory.as_str());
        self.root.join(dir)
    }

    /// Declared scripts in execution order.
    #[must_use]
    pub fn scripts(&self) -> &[ScriptItem] {
        self.declaration
            .as_ref()
            .map_or(&[], |d| d.scripts.scripts.as_slice())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;

    fn make_repo(dir: &Path) {
        fs::write(dir.join(ROOT_CONFIG_FILE), "").unwrap();
        fs::create_dir_all(dir.join(CONFIG_DIR)).unwrap();
    }

    #[test]
    fn locate_from_repo_root() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        let repo = DotfilesRepo::locate(None, tmp.path()).unwrap();
        assert_eq!(repo.root(), dunce::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn locate_walks_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        let deep = tmp.path().join("docs/notes");
        fs::create_dir_all(&deep).unwrap();
        let repo = DotfilesRepo::locate(None, &deep).unwrap();
        assert_eq!(repo.root(), dunce::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn locate_skips_tool_directories() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        let tool = tmp.path().join("config/zsh");
        fs::create_dir_all(tool.join("config")).unwrap();
        fs::write(tool.join(ROOT_CONFIG_FILE), "").unwrap();

        let repo = DotfilesRepo::locate(None, &tool.join("config")).unwrap();
        assert_eq!(repo.root(), dunce::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn override_must_be_a_repo() {
        let tmp = tempfile::tempdir().unwrap();
        let err = DotfilesRepo::locate(Some(tmp.path()), tmp.path()).unwrap_err();
        assert!(matches!(err, MerlinError::NotADotfilesRepo(_)));
    }

    #[test]
    fn override_takes_precedence() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        make_repo(a.path());
        make_repo(b.path());
        let repo = DotfilesRepo::locate(Some(b.path()), a.path()).unwrap();
        assert_eq!(repo.root(), dunce::canonicalize(b.path()).unwrap());
    }

    #[test]
    fn repo_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = DotfilesRepo::locate(None, tmp.path()).unwrap_err();
        assert!(matches!(err, MerlinError::RepoNotFound));
    }

    #[test]
    fn list_tools_returns_directories_only() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        fs::create_dir_all(tmp.path().join("config/zsh")).unwrap();
        fs::create_dir_all(tmp.path().join("config/git")).unwrap();
        fs::write(tmp.path().join("config/README.md"), "").unwrap();
        let repo = DotfilesRepo::open(tmp.path()).unwrap();
        let mut tools = repo.list_tools().unwrap();
        tools.sort();
        assert_eq!(tools, vec!["git", "zsh"]);
    }

    #[test]
    fn load_model_resolves_tools_and_packages() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        let zsh = tmp.path().join("config/zsh");
        fs::create_dir_all(zsh.join("config")).unwrap();
        fs::write(zsh.join("config/zshrc"), "x").unwrap();
        fs::write(
            zsh.join(ROOT_CONFIG_FILE),
            "[[link]]\nsource = \"config/zshrc\"\ntarget = \"~/.zshrc\"\n\n[scripts]\nscripts = [\"a.sh\"]\n",
        )
        .unwrap();
        fs::create_dir_all(tmp.path().join("config/brew")).unwrap();
        fs::write(
            tmp.path().join("config/brew/brew.toml"),
            "[[formulae]]\nname = \"fzf\"\n",
        )
        .unwrap();

        let repo = DotfilesRepo::open(tmp.path()).unwrap();
        let model = repo.load_model(Path::new("/tmp/h")).unwrap();
        let zsh = model.tool("zsh").unwrap();
        assert_eq!(zsh.links.len(), 1);
        assert_eq!(zsh.links[0].target, PathBuf::from("/tmp/h/.zshrc"));
        assert_eq!(zsh.scripts().len(), 1);
        assert!(zsh.scripts_dir().ends_with("config/zsh/scripts"));
        assert_eq!(model.packages.formulae[0].name, "fzf");
        assert!(model.tool("brew").unwrap().links.is_empty());
    }

    #[test]
    fn load_tool_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        let repo = DotfilesRepo::open(tmp.path()).unwrap();
        let vars = Variables::resolve(&root::Settings::default(), Path::new("/tmp/h"));
        let err = repo.load_tool("nope", &vars).unwrap_err();
        assert!(matches!(err, MerlinError::UnknownTool(t) if t == "nope"));
    }

    #[test]
    fn malformed_tool_declaration_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        make_repo(tmp.path());
        let zsh = tmp.path().join("config/zsh");
        fs::create_dir_all(&zsh).unwrap();
        fs::write(zsh.join(ROOT_CONFIG_FILE), "[[link]\n").unwrap();
        let repo = DotfilesRepo::open(tmp.path()).unwrap();
        let err = repo.load_model(Path::new("/tmp/h")).unwrap_err();
        assert!(matches!(err, MerlinError::Parse { path, .. } if path.ends_with("config/zsh/merlin.toml")));
    }
}
