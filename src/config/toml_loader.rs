//! TOML declaration file loading.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{MerlinError, Result};

/// Load and deserialize a TOML file.
///
/// A missing file yields the type's empty configuration (the result of
/// deserializing an empty document), so every field must carry a default.
///
/// # Errors
///
/// Returns [`MerlinError::Parse`] if the file exists but cannot be read or
/// parsed.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return parse(path, "");
    }
    let content = std::fs::read_to_string(path).map_err(|e| MerlinError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse(path, &content)
}

/// Load a TOML file that may legitimately be absent.
///
/// # Errors
///
/// Returns [`MerlinError::Parse`] if the file exists but is malformed.
pub fn load_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if path.is_file() {
        load_config(path).map(Some)
    } else {
        Ok(None)
    }
}

fn parse<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| MerlinError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::packages::BrewFile;

    #[test]
    fn missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let brew: BrewFile = load_config(&dir.path().join("nope.toml")).unwrap();
        assert!(brew.formulae.is_empty());
        let opt: Option<BrewFile> = load_optional(&dir.path().join("nope.toml")).unwrap();
        assert!(opt.is_none());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brew.toml");
        std::fs::write(&path, "[[formulae]\nname = 1").unwrap();
        let err = load_config::<BrewFile>(&path).unwrap_err();
        assert!(
            matches!(&err, MerlinError::Parse { path: p, .. } if p == &path),
            "expected Parse error, got {err:?}"
        );
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brew.toml");
        std::fs::write(&path, "formulae = \"fzf\"\n").unwrap();
        assert!(load_config::<BrewFile>(&path).is_err());
    }
}
