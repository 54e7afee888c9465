/**
 * Manifest Cache
 *
 * Fetches `metadata.json` from the model repository and keeps the derived
 * model list in `models_cache.json` for 24 hours.
 */
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{ConfigManager, RepositoryConfig};
use crate::error::{Error, Result};
use crate::models::{split_pair_id, DownloadableModel, Lang, Variant};

pub const CACHE_FILE_NAME: &str = "models_cache.json";
/// 24 hours
pub const CACHE_TTL_MS: i64 = 86_400_000;

/// Source of "now" in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Integrity metadata for one archive in the manifest
#[derive(Debug, Clone, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    checksum: String,
    size: u64,
}

/// `{ "lite": { "<src>-<tgt>": {checksum, size} }, "full": { ... } }`
#[derive(Debug, Deserialize)]
struct ModelMetadata {
    #[serde(default)]
    lite: BTreeMap<String, ModelInfo>,
    #[serde(default)]
    full: BTreeMap<String, ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCacheEntry {
    pub models: Vec<DownloadableModel>,
    #[serde(rename = "timestamp")]
    pub fetched_at_ms: i64,
}

impl ManifestCacheEntry {
    /// Valid only while `0 <= now - fetched_at < TTL`
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        let age = now_ms - self.fetched_at_ms;
        (0..CACHE_TTL_MS).contains(&age)
    }
}

pub struct ManifestCache {
    client: reqwest::Client,
    config: ConfigManager,
    cache_file: PathBuf,
    clock: Arc<dyn Clock>,
    /// Held across check-fetch-persist so concurrent callers share one fetch
    entry: Mutex<Option<ManifestCacheEntry>>,
}

impl ManifestCache {
    pub fn new(config: ConfigManager, cache_dir: &Path) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            config,
            cache_file: cache_dir.join(CACHE_FILE_NAME),
            clock: Arc::new(SystemClock),
            entry: Mutex::new(None),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Cached models if fresh, otherwise fetch, persist and return the new list
    pub async fn get_available_models(&self) -> Result<Vec<DownloadableModel>> {
        let mut slot = self.entry.lock().await;

        if slot.is_none() {
            *slot = self.read_cache_file().await;
        }

        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh(self.clock.now_ms()) {
                log::debug!("[ManifestCache] Serving {} cached models", entry.models.len());
                return Ok(entry.models.clone());
            }
        }

        self.refetch(&mut slot).await
    }

    /// Ignore the cache and fetch now. Caller-initiated retry path.
    pub async fn refresh(&self) -> Result<Vec<DownloadableModel>> {
        let mut slot = self.entry.lock().await;
        self.refetch(&mut slot).await
    }

    /// Drop the in-memory and on-disk cache
    pub async fn invalidate(&self) -> Result<()> {
        let mut slot = self.entry.lock().await;
        *slot = None;
        match tokio::fs::remove_file(&self.cache_file).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn refetch(&self, slot: &mut Option<ManifestCacheEntry>) -> Result<Vec<DownloadableModel>> {
        let config = self.config.load();
        let models = self.fetch_models(&config).await?;

        let entry = ManifestCacheEntry {
            models,
            fetched_at_ms: self.clock.now_ms(),
        };
        if let Err(e) = self.write_cache_file(&entry).await {
            log::warn!("[ManifestCache] Could not persist {:?}: {}", self.cache_file, e);
        }

        let models = entry.models.clone();
        *slot = Some(entry);
        Ok(models)
    }

    async fn fetch_models(&self, config: &RepositoryConfig) -> Result<Vec<DownloadableModel>> {
        let url = config.manifest_url();
        log::info!("[ManifestCache] Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "failed to fetch metadata: HTTP {}",
                response.status()
            )));
        }

        let text = response.text().await?;
        let metadata: ModelMetadata = serde_json::from_str(&text)
            .map_err(|e| Error::Network(format!("invalid metadata.json: {}", e)))?;

        let models = build_models(config, metadata);
        log::info!("[ManifestCache] Manifest lists {} models", models.len());
        Ok(models)
    }

    /// Decode failures count as a cache miss
    async fn read_cache_file(&self) -> Option<ManifestCacheEntry> {
        let text = tokio::fs::read_to_string(&self.cache_file).await.ok()?;
        match serde_json::from_str(&text) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("[ManifestCache] Ignoring unreadable cache file: {}", e);
                None
            }
        }
    }

    /// Write to a sibling temp file and rename over the old cache
    async fn write_cache_file(&self, entry: &ManifestCacheEntry) -> Result<()> {
        if let Some(parent) = self.cache_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(entry)
            .map_err(|e| Error::Config(format!("serialize manifest cache: {}", e)))?;
        let tmp = self.cache_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.cache_file).await?;
        Ok(())
    }
}

fn build_models(config: &RepositoryConfig, metadata: ModelMetadata) -> Vec<DownloadableModel> {
    let groups = [(Variant::Lite, metadata.lite), (Variant::Full, metadata.full)];

    let mut models = Vec::new();
    for (variant, entries) in groups {
        for (id, info) in entries {
            let Some((source, target)) = split_pair_id(&id) else {
                log::warn!("[ManifestCache] Skipping malformed pair id {:?} ({})", id, variant);
                continue;
            };
            models.push(DownloadableModel {
                source_lang: Lang::from_code(source),
                target_lang: Lang::from_code(target),
                download_url: config.download_url(variant, &id),
                size: info.size,
                checksum: info.checksum,
                variant,
                id,
            });
        }
    }
    models
}
