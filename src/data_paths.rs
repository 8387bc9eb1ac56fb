//! Centralized data paths for treelight
//!
//! Downloaded grammar libraries and highlight query text live under a
//! single data root:
//! - `<root>/languages/` — grammar shared libraries
//! - `<root>/queries/` — highlight query text
//!
//! This module is the single source of truth for those paths.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "treelight";

/// Subdirectory for cached grammar shared libraries
pub const LANGUAGES_SUBDIR: &str = "languages";
/// Subdirectory for cached highlight query text
pub const QUERIES_SUBDIR: &str = "queries";

/// Default data root for treelight
///
/// Unix/macOS:
///   - If XDG_DATA_HOME is set: `$XDG_DATA_HOME/treelight`
///   - Else: `~/.local/share/treelight`
///
/// Windows:
///   - `%LOCALAPPDATA%\treelight`
pub fn default_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var("LOCALAPPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_DIR))
    }

    #[cfg(not(target_os = "windows"))]
    {
        env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .map(|data| data.join(APP_DIR))
    }
}

/// `<root>/languages/`
pub fn languages_dir(root: &Path) -> PathBuf {
    root.join(LANGUAGES_SUBDIR)
}

/// `<root>/queries/`
pub fn queries_dir(root: &Path) -> PathBuf {
    root.join(QUERIES_SUBDIR)
}

/// `<root>/logs/`
pub fn logs_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))
}

/// Ensure a subdirectory of the data root exists, returning it
pub fn ensure_subdir(root: &Path, subdir: &str) -> Result<PathBuf, String> {
    let dir = root.join(subdir);
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Ensure the logs dir exists under the data root, returning it
pub fn ensure_logs_dir(root: &Path) -> Result<PathBuf, String> {
    ensure_subdir(root, "logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdir_layout() {
        let root = Path::new("/tmp/treelight-test");
        assert_eq!(
            languages_dir(root),
            PathBuf::from("/tmp/treelight-test/languages")
        );
        assert_eq!(
            queries_dir(root),
            PathBuf::from("/tmp/treelight-test/queries")
        );
    }

    #[test]
    fn test_ensure_subdir_creates() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ensure_subdir(tmp.path(), LANGUAGES_SUBDIR).unwrap();
        assert!(dir.is_dir());
        // Idempotent
        assert!(ensure_subdir(tmp.path(), LANGUAGES_SUBDIR).is_ok());
    }
}
