//! File-system helpers shared by the reconciliation engines.
use std::io;
use std::path::{Component, Path, PathBuf};

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) with owner-only `rwx` permissions if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        builder.mode(0o700);
    }
    builder.create(parent)
}

/// Remove whatever lives at `path`: a file, a symlink (broken or not), or a
/// directory tree.  Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether `path` is a symlink (without following it).
#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Whether `path` is a regular file with at least one executable bit.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Normalize `path` lexically: drop `.` components and fold `..` into the
/// preceding component.  Symlinks are not consulted.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Where the symlink at `link` points, as an absolute cleaned path.
///
/// A relative destination is resolved against the link's parent.
///
/// # Errors
///
/// Returns an error if `link` is not a symlink or cannot be read.
pub fn link_destination(link: &Path) -> io::Result<PathBuf> {
    let dest = std::fs::read_link(link)?;
    let joined = if dest.is_absolute() {
        dest
    } else {
        link.parent().unwrap_or_else(|| Path::new("/")).join(dest)
    };
    Ok(clean(&joined))
}

/// Whether two paths name the same location.
///
/// Lexically cleaned paths are compared first; when both exist their
/// canonical forms are compared as well, so `/tmp` and `/private/tmp` on
/// macOS agree.
#[must_use]
pub fn same_location(a: &Path, b: &Path) -> bool {
    if clean(a) == clean(b) {
        return true;
    }
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// One entry found by [`walk_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// Regular file.
    File(PathBuf),
    /// Symlink, recorded without following it.
    Symlink(PathBuf),
    /// Directory with no entries.
    EmptyDir(PathBuf),
}

/// Everything needed to rebuild `path`: regular files, symlinks and empty
/// directories, depth first in sorted order.  A file or symlink at `path`
/// itself yields a single node.
///
/// # Errors
///
/// Returns an error if an entry cannot be read, or is a socket, FIFO or
/// device that cannot be captured.
pub fn walk_tree(path: &Path) -> io::Result<Vec<TreeNode>> {
    let mut out = Vec::new();
    walk_into(path, &mut out)?;
    Ok(out)
}

fn walk_into(path: &Path, out: &mut Vec<TreeNode>) -> io::Result<()> {
    let file_type = std::fs::symlink_metadata(path)?.file_type();
    if file_type.is_symlink() {
        out.push(TreeNode::Symlink(path.to_path_buf()));
    } else if file_type.is_file() {
        out.push(TreeNode::File(path.to_path_buf()));
    } else if file_type.is_dir() {
        let mut children = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        if children.is_empty() {
            out.push(TreeNode::EmptyDir(path.to_path_buf()));
        }
        children.sort();
        for child in &children {
            walk_into(child, out)?;
        }
    } else {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("cannot capture special file {}", path.display()),
        ));
    }
    Ok(())
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Always fails: symlinks are only supported on unix.
#[cfg(not(unix))]
pub fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clean_folds_dot_components() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("/a/b/c/../../d")), PathBuf::from("/a/d"));
        assert_eq!(clean(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn ensure_parent_dir_creates_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c/file");
        ensure_parent_dir(&target).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn ensure_parent_dir_uses_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        ensure_parent_dir(&dir.path().join("new/file")).unwrap();
        let mode = std::fs::metadata(dir.path().join("new"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0, "group/other bits should be clear: {mode:o}");
    }

    #[test]
    fn remove_existing_handles_every_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let tree = dir.path().join("t/sub");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("g"), "y").unwrap();

        remove_existing(&file).unwrap();
        remove_existing(&dir.path().join("t")).unwrap();
        remove_existing(&dir.path().join("never-existed")).unwrap();
        assert!(!file.exists());
        assert!(!dir.path().join("t").exists());
    }

    #[cfg(unix)]
    #[test]
    fn relative_link_destination_resolves_against_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::create_dir(dir.path().join("links")).unwrap();
        let link = dir.path().join("links/l");
        std::os::unix::fs::symlink("../src/./f", &link).unwrap();
        assert_eq!(link_destination(&link).unwrap(), dir.path().join("src/f"));
        assert!(is_symlink(&link));
        assert!(same_location(&link_destination(&link).unwrap(), &dir.path().join("src/f")));
    }

    #[cfg(unix)]
    #[test]
    fn remove_existing_removes_broken_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink("/nonexistent/target", &link).unwrap();
        remove_existing(&link).unwrap();
        assert!(std::fs::symlink_metadata(&link).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn walk_tree_keeps_symlinks_and_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("b/c")).unwrap();
        std::fs::create_dir_all(root.join("b/empty")).unwrap();
        std::fs::write(root.join("a"), "").unwrap();
        std::fs::write(root.join("b/c/d"), "").unwrap();
        symlink(Path::new("../a"), &root.join("b/link")).unwrap();
        let nodes = walk_tree(root).unwrap();
        assert_eq!(
            nodes,
            vec![
                TreeNode::File(root.join("a")),
                TreeNode::File(root.join("b/c/d")),
                TreeNode::EmptyDir(root.join("b/empty")),
                TreeNode::Symlink(root.join("b/link")),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn walk_tree_does_not_follow_a_top_level_symlink() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("real/f"), "").unwrap();
        let link = dir.path().join("link");
        symlink(&dir.path().join("real"), &link).unwrap();
        assert_eq!(walk_tree(&link).unwrap(), vec![TreeNode::Symlink(link)]);
    }

    #[cfg(unix)]
    #[test]
    fn is_executable_checks_mode() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("s.sh");
        std::fs::write(&f, "#!/bin/sh\n").unwrap();
        assert!(!is_executable(&f));
        std::fs::set_permissions(&f, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&f));
        assert!(!is_executable(dir.path()));
    }
}
