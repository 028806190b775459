//! Manifest-based snapshot store with checksum-verified restore.
//!
//! Layout: `<root>/<id>/manifest.json` plus one copy per captured file under
//! `<root>/<id>/`.  The manifest is written last, so an interrupted snapshot
//! leaves a directory that [`BackupStore::list`] never exposes.
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::helpers::fs::{
    TreeNode, clean, ensure_parent_dir, is_symlink, link_destination, symlink, walk_tree,
};
use crate::error::{MerlinError, Result};

/// Backup root relative to the user's home.
pub const BACKUP_ROOT: &str = ".merlin/backups";
/// Manifest file name inside each backup directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const ID_FORMAT: &str = "%Y%m%d-%H%M%S";

/// What a manifest entry captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file with a checksummed copy.
    #[default]
    File,
    /// Symlink; only its destination is kept.
    Symlink,
    /// Empty directory.
    Dir,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_regular(kind: &EntryKind) -> bool {
    matches!(kind, EntryKind::File)
}

/// One captured entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    /// Absolute path the file was captured from.
    pub original_path: String,
    /// Location of the copy, relative to the backup directory.
    pub backup_path: String,
    /// Size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 of the copy.
    pub checksum: String,
    /// Entry type; omitted from the manifest for regular files.
    #[serde(default, skip_serializing_if = "is_regular")]
    pub kind: EntryKind,
    /// Destination of a captured symlink, as stored in the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

/// Description of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    /// `YYYYMMDD-HHMMSS`, with a `-N` suffix on same-second collisions.
    pub id: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Why the snapshot was taken.
    pub reason: String,
    /// Dotfiles repository active at creation time, if any.
    pub merlin_dir: String,
    /// Captured entries.
    pub files: Vec<BackupFile>,
}

impl BackupManifest {
    /// Parsed creation time; `None` if the timestamp is malformed.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Local>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Local))
    }

    /// Total size of all captured files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Which snapshots [`BackupStore::clean`] removes.
///
/// With both limits set a snapshot must be beyond the newest `keep` *and*
/// older than `older_than_days` to be removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanPolicy {
    /// Always retain this many newest snapshots.
    pub keep: Option<usize>,
    /// Remove snapshots older than this many days.
    pub older_than_days: Option<u64>,
}

/// The snapshot store.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
    home: PathBuf,
    merlin_dir: Option<PathBuf>,
}

impl BackupStore {
    /// Store rooted at `root`; `home` is used for `~` expansion.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            home: home.into(),
            merlin_dir: None,
        }
    }

    /// Store at the default location under `home`.
    #[must_use]
    pub fn for_home(home: &Path) -> Self {
        Self::new(home.join(BACKUP_ROOT), home)
    }

    /// Record `dir` as the active repository.  Restore never writes through
    /// a symlink that points into it.
    #[must_use]
    pub fn with_merlin_dir(mut self, dir: &Path) -> Self {
        self.merlin_dir = Some(dir.to_path_buf());
        self
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of snapshot `id`.
    #[must_use]
    pub fn backup_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Absolute location of `file`'s copy inside snapshot `id`.
    #[must_use]
    pub fn copy_path(&self, id: &str, file: &BackupFile) -> PathBuf {
        let p = Path::new(&file.backup_path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.backup_dir(id).join(p)
        }
    }

    /// Expand a leading `~` against the store's home.
    #[must_use]
    pub fn expand(&self, path: &Path) -> PathBuf {
        let s = path.to_string_lossy();
        if s == "~" {
            self.home.clone()
        } else if let Some(rest) = s.strip_prefix("~/") {
            self.home.join(rest)
        } else {
            path.to_path_buf()
        }
    }

    /// Snapshot `paths` now.
    ///
    /// # Errors
    ///
    /// See [`BackupStore::create_at`].
    pub fn create(&self, paths: &[PathBuf], reason: &str) -> Result<BackupManifest> {
        self.create_at(paths, reason, Local::now())
    }

    /// Snapshot `paths` as of `now`.
    ///
    /// Directories and missing paths are skipped; a symlink is captured by
    /// the content it points at.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::NoBackupFiles`] if nothing qualifies, or an
    /// I/O error if copying fails.  A failed snapshot leaves no manifest.
    pub fn create_at(
        &self,
        paths: &[PathBuf],
        reason: &str,
        now: DateTime<Local>,
    ) -> Result<BackupManifest> {
        let sources: Vec<TreeNode> = paths
            .iter()
            .map(|p| self.expand(p))
            .filter(|p| p.is_file())
            .map(TreeNode::File)
            .collect();
        self.write_snapshot(&sources, reason, now)
    }

    /// Snapshot everything at `target` so it can be rebuilt exactly: a
    /// file, a symlink by its destination, or a directory tree including
    /// nested symlinks and empty subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `target` is missing, holds an entry that
    /// cannot be captured, or copying fails.  Nothing is recorded then.
    pub fn snapshot_tree(&self, target: &Path, reason: &str) -> Result<BackupManifest> {
        let nodes = walk_tree(target).map_err(|e| MerlinError::io(target, e))?;
        self.write_snapshot(&nodes, reason, Local::now())
    }

    fn write_snapshot(
        &self,
        nodes: &[TreeNode],
        reason: &str,
        now: DateTime<Local>,
    ) -> Result<BackupManifest> {
        if nodes.is_empty() {
            return Err(MerlinError::NoBackupFiles);
        }

        let id = self.allocate_id(now)?;
        let dir = self.backup_dir(&id);
        let files = match nodes
            .iter()
            .map(|node| self.capture(&dir, node))
            .collect::<Result<Vec<_>>>()
        {
            Ok(files) => files,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::debug!("leaving partial backup {}: {cleanup}", dir.display());
                }
                return Err(e);
            }
        };

        let manifest = BackupManifest {
            id,
            timestamp: now.to_rfc3339(),
            reason: reason.to_string(),
            merlin_dir: self
                .merlin_dir
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned())
                .unwrap_or_default(),
            files,
        };
        let manifest_path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest).map_err(|e| MerlinError::Parse {
            path: manifest_path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&manifest_path, json).map_err(|e| MerlinError::io(&manifest_path, e))?;
        tracing::debug!(
            "backup {} created with {} entries",
            manifest.id,
            manifest.files.len()
        );
        Ok(manifest)
    }

    /// Record one node into snapshot directory `dir`.
    fn capture(&self, dir: &Path, node: &TreeNode) -> Result<BackupFile> {
        let (source, kind) = match node {
            TreeNode::File(p) => (p, EntryKind::File),
            TreeNode::Symlink(p) => (p, EntryKind::Symlink),
            TreeNode::EmptyDir(p) => (p, EntryKind::Dir),
        };
        let rel = self.copy_name(source);
        let mut entry = BackupFile {
            original_path: source.to_string_lossy().into_owned(),
            backup_path: rel.to_string_lossy().into_owned(),
            kind,
            ..BackupFile::default()
        };
        match kind {
            EntryKind::File => {
                let dest = dir.join(&rel);
                ensure_parent_dir(&dest).map_err(|e| MerlinError::io(&dest, e))?;
                let (size, checksum) = copy_hashed(source, &dest)?;
                copy_mode(source, &dest)?;
                entry.size = size;
                entry.checksum = checksum;
            }
            EntryKind::Symlink => {
                let dest = fs::read_link(source).map_err(|e| MerlinError::io(source, e))?;
                entry.link_target = Some(dest.to_string_lossy().into_owned());
            }
            EntryKind::Dir => {}
        }
        Ok(entry)
    }

    /// Every well-formed snapshot, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store root exists but cannot be read.
    pub fn list(&self) -> Result<Vec<BackupManifest>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MerlinError::io(&self.root, e)),
        };
        let mut manifests: Vec<BackupManifest> = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| read_manifest(&e.path().join(MANIFEST_FILE)).ok())
            .collect();
        manifests.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(manifests)
    }

    /// Load the manifest of snapshot `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::BackupNotFound`] if there is no such snapshot
    /// and [`MerlinError::Parse`] if its manifest is malformed.
    pub fn load(&self, id: &str) -> Result<BackupManifest> {
        let path = self.backup_dir(id).join(MANIFEST_FILE);
        if id.is_empty() || id.contains('/') || !path.is_file() {
            return Err(MerlinError::BackupNotFound(id.to_string()));
        }
        read_manifest(&path)
    }

    /// Verify the entries of `manifest` selected by `only` (all when empty).
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::BackupCorrupt`] naming the first bad entry.
    pub fn verify<'m>(
        &self,
        manifest: &'m BackupManifest,
        only: &[PathBuf],
    ) -> Result<Vec<&'m BackupFile>> {
        let wanted: Vec<PathBuf> = only.iter().map(|p| clean(&self.expand(p))).collect();
        let selected: Vec<&BackupFile> = manifest
            .files
            .iter()
            .filter(|f| wanted.is_empty() || wanted.contains(&clean(Path::new(&f.original_path))))
            .collect();

        let corrupt = |entry: &BackupFile, why: &str| MerlinError::BackupCorrupt {
            id: manifest.id.clone(),
            entry: format!("{}: {why}", entry.original_path),
        };
        for entry in &selected {
            match entry.kind {
                EntryKind::File => {}
                EntryKind::Symlink if entry.link_target.is_none() => {
                    return Err(corrupt(entry, "symlink destination missing"));
                }
                EntryKind::Symlink | EntryKind::Dir => continue,
            }
            let copy = self.copy_path(&manifest.id, entry);
            let meta = fs::metadata(&copy).map_err(|_| corrupt(entry, "backup copy missing"))?;
            if meta.len() != entry.size {
                return Err(corrupt(
                    entry,
                    &format!("size mismatch (expected {}, found {})", entry.size, meta.len()),
                ));
            }
            let actual = compute_sha256(&copy)?;
            if actual != entry.checksum {
                return Err(corrupt(entry, "checksum mismatch"));
            }
        }
        Ok(selected)
    }

    /// Restore snapshot `id`, optionally only the files in `only`.
    ///
    /// Every selected entry is verified before anything is written.  A
    /// symlink into the active repository at a destination (or one of its
    /// ancestors) is removed first so the copy never lands inside the repo.
    /// A file or symlink already at a destination is unlinked rather than
    /// written through, so read-only files are replaced too.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::BackupNotFound`], [`MerlinError::BackupCorrupt`]
    /// or an I/O error.
    pub fn restore(&self, id: &str, only: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let manifest = self.load(id)?;
        let selected = self.verify(&manifest, only)?;

        let mut restored = Vec::with_capacity(selected.len());
        for entry in selected {
            let original = PathBuf::from(&entry.original_path);
            self.detach_repo_links(&original)?;
            match entry.kind {
                EntryKind::Dir => {
                    fs::create_dir_all(&original).map_err(|e| MerlinError::io(&original, e))?;
                }
                EntryKind::Symlink => {
                    clear_slot(&original)?;
                    ensure_parent_dir(&original).map_err(|e| MerlinError::io(&original, e))?;
                    let dest = entry.link_target.as_deref().unwrap_or_default();
                    symlink(Path::new(dest), &original)
                        .map_err(|e| MerlinError::io(&original, e))?;
                }
                EntryKind::File => {
                    clear_slot(&original)?;
                    ensure_parent_dir(&original).map_err(|e| MerlinError::io(&original, e))?;
                    let copy = self.copy_path(&manifest.id, entry);
                    fs::copy(&copy, &original).map_err(|e| MerlinError::io(&original, e))?;
                    copy_mode(&copy, &original)?;
                }
            }
            restored.push(original);
        }
        Ok(restored)
    }

    /// Remove snapshot `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MerlinError::BackupNotFound`] or an I/O error.
    pub fn delete(&self, id: &str) -> Result<()> {
        let dir = self.backup_dir(id);
        if id.is_empty() || id.contains('/') || !dir.is_dir() {
            return Err(MerlinError::BackupNotFound(id.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|e| MerlinError::io(&dir, e))
    }

    /// Snapshots selected by `policy` as of `now`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn clean_candidates(
        &self,
        policy: CleanPolicy,
        now: DateTime<Local>,
    ) -> Result<Vec<BackupManifest>> {
        if policy.keep.is_none() && policy.older_than_days.is_none() {
            return Ok(Vec::new());
        }
        // An age too large to represent selects nothing.
        let cutoff = policy.older_than_days.map(|d| {
            i64::try_from(d)
                .ok()
                .and_then(chrono::Duration::try_days)
                .and_then(|age| now.checked_sub_signed(age))
        });
        Ok(self
            .list()?
            .into_iter()
            .enumerate()
            .filter(|(i, m)| {
                let beyond_keep = policy.keep.is_none_or(|k| *i >= k);
                let too_old = match cutoff {
                    None => true,
                    Some(None) => false,
                    Some(Some(c)) => m.created_at().is_some_and(|t| t < c),
                };
                beyond_keep && too_old
            })
            .map(|(_, m)| m)
            .collect())
    }

    /// Delete the snapshots selected by `policy`; with `dry_run` nothing is
    /// removed.  Returns the affected ids.
    ///
    /// # Errors
    ///
    /// Returns the first deletion failure.
    pub fn clean(
        &self,
        policy: CleanPolicy,
        now: DateTime<Local>,
        dry_run: bool,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for manifest in self.clean_candidates(policy, now)? {
            if !dry_run {
                self.delete(&manifest.id)?;
            }
            ids.push(manifest.id);
        }
        Ok(ids)
    }

    fn allocate_id(&self, now: DateTime<Local>) -> Result<String> {
        fs::create_dir_all(&self.root).map_err(|e| MerlinError::io(&self.root, e))?;
        let base = now.format(ID_FORMAT).to_string();
        let mut candidate = base.clone();
        let mut n = 0u32;
        loop {
            match fs::create_dir(self.backup_dir(&candidate)) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    n += 1;
                    candidate = format!("{base}-{n}");
                }
                Err(e) => return Err(MerlinError::io(self.backup_dir(&candidate), e)),
            }
        }
    }

    /// Relative location of a copy: `home/<rel>` for paths under the home,
    /// `root/<abs>` otherwise.
    fn copy_name(&self, source: &Path) -> PathBuf {
        source.strip_prefix(&self.home).map_or_else(
            |_| {
                let stripped: PathBuf = source
                    .components()
                    .filter(|c| matches!(c, std::path::Component::Normal(_)))
                    .collect();
                Path::new("root").join(stripped)
            },
            |rel| Path::new("home").join(rel),
        )
    }

    /// Remove a symlink into the repository at `path` or any ancestor.
    fn detach_repo_links(&self, path: &Path) -> Result<()> {
        let Some(repo) = &self.merlin_dir else {
            return Ok(());
        };
        for candidate in path.ancestors() {
            if candidate == self.home || candidate.parent().is_none() {
                break;
            }
            if is_symlink(candidate)
                && let Ok(dest) = link_destination(candidate)
                && dest.starts_with(repo)
            {
                tracing::debug!("removing repo link {} before restore", candidate.display());
                fs::remove_file(candidate).map_err(|e| MerlinError::io(candidate, e))?;
            }
        }
        Ok(())
    }
}

/// Unlink a file or symlink at `path` so it can be recreated.  Directories
/// are left for the caller to trip over.
fn clear_slot(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(path).map_err(|e| MerlinError::io(path, e)),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MerlinError::io(path, e)),
    }
}

fn read_manifest(path: &Path) -> Result<BackupManifest> {
    let content = fs::read_to_string(path).map_err(|e| MerlinError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| MerlinError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Copy `src` to `dest`, hashing the bytes as they stream through.
fn copy_hashed(src: &Path, dest: &Path) -> Result<(u64, String)> {
    let mut input = File::open(src).map_err(|e| MerlinError::io(src, e))?;
    let mut output = File::create(dest).map_err(|e| MerlinError::io(dest, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = input.read(&mut buf).map_err(|e| MerlinError::io(src, e))?;
        if n == 0 {
            break;
        }
        let chunk = buf.get(..n).unwrap_or_default();
        hasher.update(chunk);
        output.write_all(chunk).map_err(|e| MerlinError::io(dest, e))?;
        size += n as u64;
    }
    output.sync_all().map_err(|e| MerlinError::io(dest, e))?;
    Ok((size, to_hex(&hasher.finalize())))
}

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| MerlinError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| MerlinError::io(path, e))?;
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}

fn copy_mode(from: &Path, to: &Path) -> Result<()> {
    let perms = fs::metadata(from)
        .map_err(|e| MerlinError::io(from, e))?
        .permissions();
    fs::set_permissions(to, perms).map_err(|e| MerlinError::io(to, e))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    struct Fixture {
        _tmp: tempfile::TempDir,
        home: PathBuf,
        store: BackupStore,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        let store = BackupStore::for_home(&home);
        Fixture {
            _tmp: tmp,
            home,
            store,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn sha256_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("abc");
        fs::write(&f, "abc").unwrap();
        assert_eq!(
            compute_sha256(&f).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn create_writes_manifest_and_copies() {
        let fx = fixture();
        let rc = fx.home.join(".zshrc");
        fs::write(&rc, "export A=1\n").unwrap();

        let m = fx
            .store
            .create_at(&[PathBuf::from("~/.zshrc")], "manual", at(10, 0, 0))
            .unwrap();
        assert_eq!(m.id, "20240301-100000");
        assert_eq!(m.reason, "manual");
        assert_eq!(m.files.len(), 1);
        assert_eq!(m.files[0].original_path, rc.to_string_lossy());
        assert_eq!(m.files[0].size, 11);
        assert_eq!(m.files[0].checksum, compute_sha256(&rc).unwrap());

        let copy = fx.store.copy_path(&m.id, &m.files[0]);
        assert!(copy.starts_with(fx.store.backup_dir(&m.id)));
        assert_eq!(fs::read_to_string(copy).unwrap(), "export A=1\n");
        assert!(fx.store.backup_dir(&m.id).join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn create_skips_directories_and_missing() {
        let fx = fixture();
        fs::create_dir_all(fx.home.join("dir")).unwrap();
        fs::write(fx.home.join("f"), "x").unwrap();
        let m = fx
            .store
            .create_at(
                &[fx.home.join("dir"), fx.home.join("missing"), fx.home.join("f")],
                "t",
                at(10, 0, 0),
            )
            .unwrap();
        assert_eq!(m.files.len(), 1);
    }

    #[test]
    fn create_with_nothing_is_an_error() {
        let fx = fixture();
        let err = fx
            .store
            .create_at(&[fx.home.join("missing")], "t", at(10, 0, 0))
            .unwrap_err();
        assert!(matches!(err, MerlinError::NoBackupFiles));
        assert!(fx.store.list().unwrap().is_empty());
    }

    #[test]
    fn same_second_ids_get_a_suffix() {
        let fx = fixture();
        fs::write(fx.home.join("f"), "x").unwrap();
        let paths = [fx.home.join("f")];
        let a = fx.store.create_at(&paths, "t", at(10, 0, 0)).unwrap();
        let b = fx.store.create_at(&paths, "t", at(10, 0, 0)).unwrap();
        let c = fx.store.create_at(&paths, "t", at(10, 0, 0)).unwrap();
        assert_eq!(a.id, "20240301-100000");
        assert_eq!(b.id, "20240301-100000-1");
        assert_eq!(c.id, "20240301-100000-2");
    }

    #[test]
    fn list_is_newest_first_and_skips_malformed() {
        let fx = fixture();
        fs::write(fx.home.join("f"), "x").unwrap();
        let paths = [fx.home.join("f")];
        fx.store.create_at(&paths, "old", at(9, 0, 0)).unwrap();
        fx.store.create_at(&paths, "new", at(11, 0, 0)).unwrap();

        let junk = fx.store.root().join("20240301-120000");
        fs::create_dir_all(&junk).unwrap();
        fs::write(junk.join(MANIFEST_FILE), "{not json").unwrap();
        fs::create_dir_all(fx.store.root().join("partial")).unwrap();

        let list = fx.store.list().unwrap();
        let reasons: Vec<_> = list.iter().map(|m| m.reason.as_str()).collect();
        assert_eq!(reasons, vec!["new", "old"]);
    }

    #[test]
    fn list_without_root_is_empty() {
        let fx = fixture();
        assert!(fx.store.list().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn restore_round_trips_content_and_mode() {
        use std::os::unix::fs::PermissionsExt as _;
        let fx = fixture();
        let f = fx.home.join(".config/tool/conf");
        fs::create_dir_all(f.parent().unwrap()).unwrap();
        fs::write(&f, "original").unwrap();
        fs::set_permissions(&f, fs::Permissions::from_mode(0o640)).unwrap();

        let m = fx.store.create_at(&[f.clone()], "t", at(10, 0, 0)).unwrap();
        fs::remove_dir_all(fx.home.join(".config")).unwrap();

        let restored = fx.store.restore(&m.id, &[]).unwrap();
        assert_eq!(restored, vec![f.clone()]);
        assert_eq!(fs::read_to_string(&f).unwrap(), "original");
        assert_eq!(fs::metadata(&f).unwrap().permissions().mode() & 0o777, 0o640);
        assert_eq!(compute_sha256(&f).unwrap(), m.files[0].checksum);
    }

    #[cfg(unix)]
    #[test]
    fn restore_replaces_read_only_file() {
        use std::os::unix::fs::PermissionsExt as _;
        let fx = fixture();
        let key = fx.home.join(".ssh/id_ed25519");
        fs::create_dir_all(key.parent().unwrap()).unwrap();
        fs::write(&key, "key-v1").unwrap();
        fs::set_permissions(&key, fs::Permissions::from_mode(0o400)).unwrap();
        let m = fx.store.create_at(&[key.clone()], "t", at(10, 0, 0)).unwrap();

        fs::set_permissions(&key, fs::Permissions::from_mode(0o600)).unwrap();
        fs::write(&key, "key-v2").unwrap();
        fs::set_permissions(&key, fs::Permissions::from_mode(0o400)).unwrap();

        fx.store.restore(&m.id, &[]).unwrap();
        assert_eq!(fs::read_to_string(&key).unwrap(), "key-v1");
        assert_eq!(fs::metadata(&key).unwrap().permissions().mode() & 0o777, 0o400);
    }

    #[test]
    fn file_entries_omit_kind_in_manifest() {
        let fx = fixture();
        fs::write(fx.home.join("f"), "x").unwrap();
        let m = fx.store.create_at(&[fx.home.join("f")], "t", at(10, 0, 0)).unwrap();
        let json = fs::read_to_string(fx.store.backup_dir(&m.id).join(MANIFEST_FILE)).unwrap();
        assert!(!json.contains("\"kind\""));
        assert!(!json.contains("link_target"));
        assert_eq!(fx.store.load(&m.id).unwrap().files[0].kind, EntryKind::File);
    }

    #[cfg(unix)]
    #[test]
    fn snapshot_tree_records_links_and_empty_dirs() {
        let fx = fixture();
        let dir = fx.home.join(".config/nvim");
        fs::create_dir_all(dir.join("after")).unwrap();
        fs::write(dir.join("init.lua"), "-- init").unwrap();
        std::os::unix::fs::symlink("init.lua", dir.join("vimrc")).unwrap();

        let m = fx.store.snapshot_tree(&dir, "link nvim").unwrap();
        let entries: Vec<(EntryKind, &str)> = m
            .files
            .iter()
            .map(|f| (f.kind, f.original_path.rsplit('/').next().unwrap()))
            .collect();
        assert_eq!(
            entries,
            vec![
                (EntryKind::Dir, "after"),
                (EntryKind::File, "init.lua"),
                (EntryKind::Symlink, "vimrc"),
            ]
        );
        assert_eq!(m.total_size(), 7);

        fs::remove_dir_all(&dir).unwrap();
        fx.store.restore(&m.id, &[]).unwrap();
        assert!(dir.join("after").is_dir());
        assert_eq!(fs::read_to_string(dir.join("init.lua")).unwrap(), "-- init");
        assert_eq!(fs::read_link(dir.join("vimrc")).unwrap(), PathBuf::from("init.lua"));
    }

    #[test]
    fn snapshot_tree_of_missing_target_records_nothing() {
        let fx = fixture();
        let err = fx.store.snapshot_tree(&fx.home.join("nope"), "t").unwrap_err();
        assert!(matches!(err, MerlinError::Io { .. }));
        assert!(fx.store.list().unwrap().is_empty());
    }

    #[test]
    fn restore_filters_by_original_path() {
        let fx = fixture();
        fs::write(fx.home.join("a"), "A").unwrap();
        fs::write(fx.home.join("b"), "B").unwrap();
        let m = fx
            .store
            .create_at(&[fx.home.join("a"), fx.home.join("b")], "t", at(10, 0, 0))
            .unwrap();
        fs::write(fx.home.join("a"), "changed").unwrap();
        fs::write(fx.home.join("b"), "changed").unwrap();

        fx.store.restore(&m.id, &[PathBuf::from("~/b")]).unwrap();
        assert_eq!(fs::read_to_string(fx.home.join("a")).unwrap(), "changed");
        assert_eq!(fs::read_to_string(fx.home.join("b")).unwrap(), "B");
    }

    #[test]
    fn corrupt_copy_aborts_whole_restore() {
        let fx = fixture();
        fs::write(fx.home.join("a"), "AAAA").unwrap();
        fs::write(fx.home.join("b"), "BBBB").unwrap();
        let m = fx
            .store
            .create_at(&[fx.home.join("a"), fx.home.join("b")], "t", at(10, 0, 0))
            .unwrap();
        fs::write(fx.home.join("a"), "new a").unwrap();
        // Same size, different bytes.
        fs::write(fx.store.copy_path(&m.id, &m.files[1]), "XXXX").unwrap();

        let err = fx.store.restore(&m.id, &[]).unwrap_err();
        assert!(
            matches!(&err, MerlinError::BackupCorrupt { entry, .. } if entry.contains("checksum mismatch")),
            "got {err:?}"
        );
        assert_eq!(fs::read_to_string(fx.home.join("a")).unwrap(), "new a");
    }

    #[test]
    fn truncated_copy_reports_size() {
        let fx = fixture();
        fs::write(fx.home.join("a"), "AAAA").unwrap();
        let m = fx.store.create_at(&[fx.home.join("a")], "t", at(10, 0, 0)).unwrap();
        fs::write(fx.store.copy_path(&m.id, &m.files[0]), "A").unwrap();
        let err = fx.store.restore(&m.id, &[]).unwrap_err();
        assert!(matches!(&err, MerlinError::BackupCorrupt { entry, .. } if entry.contains("size mismatch")));
    }

    #[cfg(unix)]
    #[test]
    fn restore_replaces_repo_symlink_instead_of_writing_through() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("home");
        let repo = tmp.path().join("repo");
        fs::create_dir_all(&home).unwrap();
        fs::create_dir_all(&repo).unwrap();
        let store = BackupStore::for_home(&home).with_merlin_dir(&repo);

        let target = home.join(".zshrc");
        fs::write(&target, "mine").unwrap();
        let m = store.create_at(&[target.clone()], "t", at(10, 0, 0)).unwrap();

        fs::remove_file(&target).unwrap();
        fs::write(repo.join("zshrc"), "repo").unwrap();
        std::os::unix::fs::symlink(repo.join("zshrc"), &target).unwrap();

        store.restore(&m.id, &[]).unwrap();
        assert!(!is_symlink(&target));
        assert_eq!(fs::read_to_string(&target).unwrap(), "mine");
        assert_eq!(fs::read_to_string(repo.join("zshrc")).unwrap(), "repo");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let fx = fixture();
        assert!(matches!(fx.store.load("nope"), Err(MerlinError::BackupNotFound(_))));
        assert!(matches!(fx.store.restore("nope", &[]), Err(MerlinError::BackupNotFound(_))));
        assert!(matches!(fx.store.delete("nope"), Err(MerlinError::BackupNotFound(_))));
        assert!(matches!(fx.store.delete("../x"), Err(MerlinError::BackupNotFound(_))));
    }

    #[test]
    fn delete_removes_directory() {
        let fx = fixture();
        fs::write(fx.home.join("f"), "x").unwrap();
        let m = fx.store.create_at(&[fx.home.join("f")], "t", at(10, 0, 0)).unwrap();
        fx.store.delete(&m.id).unwrap();
        assert!(!fx.store.backup_dir(&m.id).exists());
    }

    #[test]
    fn clean_keeps_newest() {
        let fx = fixture();
        fs::write(fx.home.join("f"), "x").unwrap();
        let paths = [fx.home.join("f")];
        for h in [8, 9, 10, 11] {
            fx.store.create_at(&paths, "t", at(h, 0, 0)).unwrap();
        }
        let policy = CleanPolicy {
            keep: Some(2),
            older_than_days: None,
        };
        let dry = fx.store.clean(policy, at(12, 0, 0), true).unwrap();
        assert_eq!(dry, vec!["20240301-090000", "20240301-080000"]);
        assert_eq!(fx.store.list().unwrap().len(), 4);

        fx.store.clean(policy, at(12, 0, 0), false).unwrap();
        let left: Vec<_> = fx.store.list().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(left, vec!["20240301-110000", "20240301-100000"]);
    }

    #[test]
    fn clean_by_age_and_keep_combined() {
        let fx = fixture();
        fs::write(fx.home.join("f"), "x").unwrap();
        let paths = [fx.home.join("f")];
        let old = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let older = Local.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();
        fx.store.create_at(&paths, "t", older).unwrap();
        fx.store.create_at(&paths, "t", old).unwrap();
        fx.store.create_at(&paths, "t", at(10, 0, 0)).unwrap();

        let age_only = CleanPolicy {
            keep: None,
            older_than_days: Some(30),
        };
        let ids = fx.store.clean(age_only, at(12, 0, 0), true).unwrap();
        assert_eq!(ids, vec!["20240101-000000", "20231201-000000"]);

        let both = CleanPolicy {
            keep: Some(2),
            older_than_days: Some(30),
        };
        let ids = fx.store.clean(both, at(12, 0, 0), true).unwrap();
        assert_eq!(ids, vec!["20231201-000000"]);

        assert!(fx.store.clean(CleanPolicy::default(), at(12, 0, 0), true).unwrap().is_empty());
    }
}
