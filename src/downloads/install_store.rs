/**
 * Install Store
 *
 * On-disk layout of installed bundles: `models/{lite|full}/{pairId}/...`.
 * Nothing is persisted about installs; the state is whatever the directory
 * listing says.
 */
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{resolve_pairs, split_pair_id, InstalledModel, ModelPair, PairMember, Variant};
use crate::paths;

/// Directory under the models root that holds half-extracted bundles
pub const STAGING_DIR_NAME: &str = ".staging";

#[derive(Debug, Clone)]
pub struct InstallStore {
    root: PathBuf,
}

impl InstallStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: models_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn variant_dir(&self, variant: Variant) -> PathBuf {
        self.root.join(variant.dir_name())
    }

    pub(crate) fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    /// Path of a bundle without touching the filesystem
    pub fn model_path(&self, model_id: &str, variant: Variant) -> Result<PathBuf> {
        validate_model_id(model_id)?;
        Ok(self.variant_dir(variant).join(model_id))
    }

    /// Path of a bundle, creating the directory if absent
    pub fn model_dir(&self, model_id: &str, variant: Variant) -> Result<PathBuf> {
        let path = self.model_path(model_id, variant)?;
        paths::ensure_dir_exists(&path)?;
        Ok(path)
    }

    /// Pair id -> variants installed for it. Empty directories do not count.
    pub fn list_installed(&self) -> Result<BTreeMap<String, Vec<Variant>>> {
        let mut installed: BTreeMap<String, Vec<Variant>> = BTreeMap::new();
        for model in self.installed_models()? {
            installed.entry(model.id).or_default().push(model.variant);
        }
        Ok(installed)
    }

    pub fn installed_models(&self) -> Result<Vec<InstalledModel>> {
        let mut models = Vec::new();

        for variant in Variant::ALL {
            let variant_dir = self.variant_dir(variant);
            if !variant_dir.exists() {
                continue;
            }

            let mut found = Vec::new();
            for entry in std::fs::read_dir(&variant_dir)? {
                let entry = entry?;
                let path = entry.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.starts_with('.') || !path.is_dir() || is_empty_dir(&path) {
                    continue;
                }
                found.push(InstalledModel {
                    id: name.to_string(),
                    variant,
                    path: path.clone(),
                });
            }

            found.sort_by(|a, b| a.id.cmp(&b.id));
            models.extend(found);
        }

        Ok(models)
    }

    pub fn is_installed(&self, model_id: &str, variant: Variant) -> bool {
        match self.model_path(model_id, variant) {
            Ok(path) => path.is_dir() && !is_empty_dir(&path),
            Err(_) => false,
        }
    }

    /// Installed bundles grouped into usable bidirectional pairs
    pub fn installed_pairs(&self) -> Result<Vec<ModelPair<InstalledModel>>> {
        Ok(resolve_pairs(&self.installed_models()?))
    }

    /// Delete a bundle. Removing an absent bundle is not an error.
    pub fn remove(&self, model_id: &str, variant: Variant) -> Result<()> {
        let path = self.model_path(model_id, variant)?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                log::info!("[InstallStore] Removed {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove_pair<M: PairMember>(&self, pair: &ModelPair<M>) -> Result<()> {
        self.remove(pair.forward.pair_id(), pair.forward.variant())?;
        self.remove(pair.reverse.pair_id(), pair.reverse.variant())
    }

    /// Get the size of an installed bundle in bytes
    pub fn installed_size(&self, model_id: &str, variant: Variant) -> Result<u64> {
        Ok(paths::dir_size(&self.model_path(model_id, variant)?))
    }
}

/// Pair ids become directory names, so they must be `<src>-<tgt>` with plain codes
pub fn validate_model_id(model_id: &str) -> Result<()> {
    let valid_code = |code: &str| code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    match split_pair_id(model_id) {
        Some((source, target)) if valid_code(source) && valid_code(target) => Ok(()),
        _ => Err(Error::InvalidModelId(model_id.to_string())),
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install(store: &InstallStore, id: &str, variant: Variant) {
        let dir = store.model_dir(id, variant).unwrap();
        std::fs::write(dir.join("model.bin"), b"weights").unwrap();
    }

    #[test]
    fn test_list_installed_groups_variants() {
        let temp = TempDir::new().unwrap();
        let store = InstallStore::new(temp.path());
        install(&store, "en-es", Variant::Lite);
        install(&store, "en-es", Variant::Full);
        install(&store, "es-en", Variant::Lite);
        // empty directory is not an install
        store.model_dir("de-en", Variant::Lite).unwrap();

        let installed = store.list_installed().unwrap();
        assert_eq!(installed.len(), 2);
        assert_eq!(installed["en-es"], vec![Variant::Lite, Variant::Full]);
        assert_eq!(installed["es-en"], vec![Variant::Lite]);
        assert!(!store.is_installed("de-en", Variant::Lite));
        assert!(store.is_installed("en-es", Variant::Full));
    }

    #[test]
    fn test_staging_is_invisible() {
        let temp = TempDir::new().unwrap();
        let store = InstallStore::new(temp.path());
        let hidden = store.variant_dir(Variant::Lite).join(".partial");
        std::fs::create_dir_all(&hidden).unwrap();
        std::fs::write(hidden.join("x"), b"x").unwrap();
        assert!(store.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = InstallStore::new(temp.path());
        install(&store, "fr-en", Variant::Full);
        assert_eq!(store.installed_size("fr-en", Variant::Full).unwrap(), 7);

        store.remove("fr-en", Variant::Full).unwrap();
        assert!(!store.is_installed("fr-en", Variant::Full));
        store.remove("fr-en", Variant::Full).unwrap();
    }

    #[test]
    fn test_installed_pairs_and_remove_pair() {
        let temp = TempDir::new().unwrap();
        let store = InstallStore::new(temp.path());
        install(&store, "en-es", Variant::Lite);
        install(&store, "es-en", Variant::Lite);
        install(&store, "en-fr", Variant::Lite);

        let pairs = store.installed_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].ids(), ("en-es", "es-en"));

        store.remove_pair(&pairs[0]).unwrap();
        let left: Vec<_> = store.list_installed().unwrap().into_keys().collect();
        assert_eq!(left, vec!["en-fr".to_string()]);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let temp = TempDir::new().unwrap();
        let store = InstallStore::new(temp.path());
        assert!(matches!(
            store.model_dir("../etc-passwd", Variant::Lite),
            Err(Error::InvalidModelId(_))
        ));
        assert!(store.model_path("en/x-es", Variant::Lite).is_err());
        assert!(store.model_path("en-es", Variant::Lite).is_ok());
    }
}
