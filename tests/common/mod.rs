// Shared helpers for integration tests.
//
// Provides a temporary dotfiles repository plus a separate home directory,
// and a fluent builder so each integration test can declare the tools it
// needs without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use merlin::config::{DotfilesRepo, Model};
use merlin::resources::backup::BackupStore;

/// An isolated repository and home directory backed by one
/// [`tempfile::TempDir`].
pub struct TestEnv {
    /// Keeps the directory alive.
    pub tmp: tempfile::TempDir,
    /// Repository root (canonical).
    pub repo: PathBuf,
    /// Home directory the model resolves `~` against.
    pub home: PathBuf,
}

impl TestEnv {
    /// Open the repository.
    pub fn dotfiles(&self) -> DotfilesRepo {
        DotfilesRepo::open(&self.repo).expect("open repo")
    }

    /// Load the declared model against the test home.
    pub fn model(&self) -> Model {
        self.dotfiles().load_model(&self.home).expect("load model")
    }

    /// Backup store under the test home, aware of the repository.
    pub fn store(&self) -> BackupStore {
        BackupStore::for_home(&self.home).with_merlin_dir(&self.repo)
    }

    /// Absolute path inside the home directory.
    pub fn home_path(&self, rel: &str) -> PathBuf {
        self.home.join(rel)
    }

    /// Absolute path inside the repository.
    pub fn repo_path(&self, rel: &str) -> PathBuf {
        self.repo.join(rel)
    }
}

/// Fluent builder for [`TestEnv`].
pub struct TestEnvBuilder {
    env: TestEnv,
}

impl TestEnvBuilder {
    /// Begin with an empty root declaration and no tools.
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let base = dunce::canonicalize(tmp.path()).expect("canonicalize temp dir");
        let repo = base.join("dotfiles");
        let home = base.join("home");
        fs::create_dir_all(repo.join("config")).expect("create config dir");
        fs::create_dir_all(&home).expect("create home");
        fs::write(repo.join("merlin.toml"), "").expect("write merlin.toml");
        Self {
            env: TestEnv { tmp, repo, home },
        }
    }

    /// Replace the root `merlin.toml`.
    pub fn root_config(self, content: &str) -> Self {
        self.file("merlin.toml", content)
    }

    /// Write `config/<tool>/merlin.toml`.
    pub fn tool(self, tool: &str, declaration: &str) -> Self {
        self.file(&format!("config/{tool}/merlin.toml"), declaration)
    }

    /// Write a file relative to the repository root.
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.env.repo.join(rel);
        write_file(&path, content);
        self
    }

    /// Write an executable script relative to the repository root.
    #[cfg(unix)]
    pub fn script(self, rel: &str, content: &str) -> Self {
        use std::os::unix::fs::PermissionsExt as _;
        let path = self.env.repo.join(rel);
        write_file(&path, content);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        self
    }

    /// Write a file relative to the home directory.
    pub fn home_file(self, rel: &str, content: &str) -> Self {
        let path = self.env.home.join(rel);
        write_file(&path, content);
        self
    }

    /// Make the repository a git repository with everything committed.
    pub fn git(self) -> Self {
        let repo = git2::Repository::init(&self.env.repo).expect("git init");
        let mut config = repo.config().expect("git config");
        config.set_str("user.name", "Test User").expect("set name");
        config.set_str("user.email", "test@example.com").expect("set email");
        let mut index = repo.index().expect("index");
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .expect("add all");
        index.write().expect("write index");
        let tree = repo
            .find_tree(index.write_tree().expect("write tree"))
            .expect("find tree");
        let sig = repo.signature().expect("signature");
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .expect("initial commit");
        self
    }

    /// Finish building.
    pub fn build(self) -> TestEnv {
        self.env
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}
