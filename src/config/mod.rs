/**
 * Repository Configuration
 *
 * The model repository is not hard-wired: anyone can host bundles in the
 * same layout on any git host that serves raw files, so the base URLs and
 * branch live in `download_config.json` next to the manifest cache.
 */
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::Variant;

pub const CONFIG_FILE_NAME: &str = "download_config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryConfig {
    /// Base URL for files served directly from the repository
    pub base_url: String,
    /// Base URL for files uploaded through Git LFS
    pub lfs_base_url: String,
    pub lite_models_dir: String,
    pub full_models_dir: String,
    pub branch_name: String,
    pub lite_uses_lfs: bool,
    pub full_uses_lfs: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com/Ezeksapps/Android-NLP".to_string(),
            lfs_base_url: "https://media.githubusercontent.com/media/Ezeksapps/Android-NLP"
                .to_string(),
            lite_models_dir: "lite".to_string(),
            full_models_dir: "full".to_string(),
            branch_name: "main".to_string(),
            lite_uses_lfs: false,
            full_uses_lfs: true,
        }
    }
}

impl RepositoryConfig {
    /// `{baseUrl}/{branch}/metadata.json`
    pub fn manifest_url(&self) -> String {
        format!(
            "{}/{}/metadata.json",
            self.base_url.trim_end_matches('/'),
            self.branch_name
        )
    }

    pub fn uses_lfs(&self, variant: Variant) -> bool {
        match variant {
            Variant::Lite => self.lite_uses_lfs,
            Variant::Full => self.full_uses_lfs,
        }
    }

    pub fn variant_dir(&self, variant: Variant) -> &str {
        match variant {
            Variant::Lite => &self.lite_models_dir,
            Variant::Full => &self.full_models_dir,
        }
    }

    /// Raw files:  `{baseUrl}/{branch}/{variant}/{id}.zip`
    /// LFS files:  `{lfsBaseUrl}/refs/heads/{branch}/{variant}/{id}.zip`
    pub fn download_url(&self, variant: Variant, model_id: &str) -> String {
        let dir = self.variant_dir(variant);
        if self.uses_lfs(variant) {
            format!(
                "{}/refs/heads/{}/{}/{}.zip",
                self.lfs_base_url.trim_end_matches('/'),
                self.branch_name,
                dir,
                model_id
            )
        } else {
            format!(
                "{}/{}/{}/{}.zip",
                self.base_url.trim_end_matches('/'),
                self.branch_name,
                dir,
                model_id
            )
        }
    }
}

/// Loads and persists `RepositoryConfig`
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_file: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Read the config, writing defaults when the file is missing, blank or unparsable
    pub fn load(&self) -> RepositoryConfig {
        let text = match std::fs::read_to_string(&self.config_file) {
            Ok(text) => text,
            Err(_) => return self.create_default(),
        };

        if text.trim().is_empty() {
            return self.create_default();
        }

        match serde_json::from_str::<RepositoryConfig>(&text) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "[Config] {:?} is not valid ({}), restoring defaults",
                    self.config_file,
                    e
                );
                self.create_default()
            }
        }
    }

    pub fn save(&self, config: &RepositoryConfig) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("serialize config: {}", e)))?;
        std::fs::write(&self.config_file, contents)?;
        log::info!("[Config] Saved {:?}", self.config_file);
        Ok(())
    }

    fn create_default(&self) -> RepositoryConfig {
        let config = RepositoryConfig::default();
        if let Err(e) = self.save(&config) {
            log::warn!("[Config] Could not write default config: {}", e);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_download_url_formation() {
        let config = RepositoryConfig::default();
        assert_eq!(
            config.download_url(Variant::Lite, "en-es"),
            "https://raw.githubusercontent.com/Ezeksapps/Android-NLP/main/lite/en-es.zip"
        );
        assert_eq!(
            config.download_url(Variant::Full, "en-es"),
            "https://media.githubusercontent.com/media/Ezeksapps/Android-NLP/refs/heads/main/full/en-es.zip"
        );
        assert_eq!(
            config.manifest_url(),
            "https://raw.githubusercontent.com/Ezeksapps/Android-NLP/main/metadata.json"
        );
    }

    #[test]
    fn test_lfs_mapping_is_configurable() {
        let config = RepositoryConfig {
            base_url: "http://mirror.local/repo/".to_string(),
            branch_name: "dev".to_string(),
            full_uses_lfs: false,
            ..Default::default()
        };
        assert_eq!(
            config.download_url(Variant::Full, "de-en"),
            "http://mirror.local/repo/dev/full/de-en.zip"
        );
    }

    #[test]
    fn test_load_writes_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp.path());
        assert_eq!(manager.load(), RepositoryConfig::default());
        let written = std::fs::read_to_string(manager.config_file()).unwrap();
        assert!(written.contains("\"baseUrl\""));
        assert!(written.contains("\"fullUsesLfs\": true"));
    }

    #[test]
    fn test_load_recovers_from_garbage() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp.path());
        std::fs::write(manager.config_file(), "{not json").unwrap();
        assert_eq!(manager.load(), RepositoryConfig::default());
        std::fs::write(manager.config_file(), "   ").unwrap();
        assert_eq!(manager.load(), RepositoryConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults_and_roundtrips_edits() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp.path());
        std::fs::write(
            manager.config_file(),
            r#"{"branchName": "stable", "someFutureKey": 1}"#,
        )
        .unwrap();
        let mut config = manager.load();
        assert_eq!(config.branch_name, "stable");
        assert_eq!(config.lite_models_dir, "lite");

        config.lite_uses_lfs = true;
        manager.save(&config).unwrap();
        assert!(manager.load().lite_uses_lfs);
    }
}
