// Data directory layout
pub mod paths;
// Repository configuration
pub mod config;
// Languages, model descriptors and pairs
pub mod models;
// Model download, verification and install
pub mod downloads;
// Native translation engine session
pub mod engine;
// Online and offline translation
pub mod translation;
// Error types
pub mod error;

pub use error::{Error, Result};

use config::ConfigManager;
use downloads::{DownloadManager, DownloadPipeline, InstallStore, ManifestCache};
use paths::AppDirs;

/// The procurement side of the app wired onto one data directory
pub struct AppContext {
    pub dirs: AppDirs,
    pub config: ConfigManager,
    pub store: InstallStore,
    pub manifest: ManifestCache,
    pub downloads: DownloadManager,
}

impl AppContext {
    /// Create the directory tree under `dirs` and build every component on it
    pub fn new(dirs: AppDirs) -> Result<Self> {
        dirs.init()?;

        let config = ConfigManager::new(&dirs.config_dir());
        let store = InstallStore::new(dirs.models_dir());
        let manifest = ManifestCache::new(config.clone(), &dirs.config_dir())?;
        let pipeline = DownloadPipeline::new(store.clone(), dirs.downloads_cache_dir())?;

        Ok(Self {
            dirs,
            config,
            store,
            manifest,
            downloads: DownloadManager::new(pipeline),
        })
    }
}
