/**
 * App Directories Module
 *
 * Provides unified access to application directories.
 *
 * All app data is stored under one root, by default:
 * - macOS: ~/Library/Application Support/com.transkit/
 * - Windows: %APPDATA%/com.transkit/
 * - Linux: ~/.local/share/com.transkit/
 */
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Bundle identifier for the app
pub const BUNDLE_ID: &str = "com.transkit";

/// Directory layout rooted at the app data directory
#[derive(Debug, Clone)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Use an explicit root (tests, `--data-dir`)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform-specific default root
    pub fn default_location() -> Result<Self> {
        dirs::data_dir()
            .map(|dir| Self::new(dir.join(BUNDLE_ID)))
            .ok_or_else(|| Error::Config("cannot determine app data directory".to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns: {root}/config/
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    /// Returns: {root}/models/
    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    /// Scratch space for in-flight archives
    ///
    /// Returns: {root}/cache/downloads/
    pub fn downloads_cache_dir(&self) -> PathBuf {
        self.root.join("cache").join("downloads")
    }

    /// Create every directory if missing. Should be called during startup.
    pub fn init(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.config_dir(),
            self.models_dir(),
            self.downloads_cache_dir(),
        ] {
            ensure_dir_exists(&dir)?;
        }
        log::info!("[Paths] App directories initialized: {:?}", self.root);
        Ok(())
    }

    /// Get storage usage for all app data
    pub fn storage_usage(&self) -> StorageUsage {
        let models = dir_size(&self.models_dir());
        let cache = dir_size(&self.root.join("cache"));
        let config = dir_size(&self.config_dir());
        StorageUsage {
            total: models + cache + config,
            models,
            cache,
            config,
        }
    }
}

/// Storage usage information
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageUsage {
    pub total: u64,
    pub models: u64,
    pub cache: u64,
    pub config: u64,
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Calculate directory size recursively
pub fn dir_size(path: &Path) -> u64 {
    if !path.exists() {
        return 0;
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_under_root() {
        let dirs = AppDirs::new("/data/app");
        assert_eq!(dirs.models_dir(), PathBuf::from("/data/app/models"));
        assert_eq!(dirs.config_dir(), PathBuf::from("/data/app/config"));
        assert!(dirs.downloads_cache_dir().ends_with("cache/downloads"));
    }

    #[test]
    fn test_init_and_usage() {
        let temp = TempDir::new().unwrap();
        let dirs = AppDirs::new(temp.path());
        dirs.init().unwrap();
        assert!(dirs.models_dir().is_dir());
        assert!(dirs.downloads_cache_dir().is_dir());

        std::fs::write(dirs.models_dir().join("a.bin"), vec![0u8; 10]).unwrap();
        std::fs::write(dirs.config_dir().join("c.json"), b"{}").unwrap();
        let usage = dirs.storage_usage();
        assert_eq!(usage.models, 10);
        assert_eq!(usage.config, 2);
        assert_eq!(usage.total, 12);
    }
}
