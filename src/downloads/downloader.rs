/**
 * Download Pipeline
 *
 * Downloads one model archive to a private temp file, verifies size and
 * SHA-256, then extracts it into the install store. A failure, a cancel or
 * a dropped future leaves neither the temp file nor a partial bundle.
 */
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use zip::ZipArchive;

use super::install_store::{validate_model_id, InstallStore};
use super::progress::{CancelFlag, DownloadTask, ProgressReporter};
use crate::error::{Error, Result};
use crate::models::DownloadableModel;

const HASH_BUFFER_SIZE: usize = 8192;
const PARTIAL_SUFFIX: &str = ".zip.part";

pub struct DownloadPipeline {
    client: reqwest::Client,
    store: InstallStore,
    temp_dir: PathBuf,
}

impl DownloadPipeline {
    /// Leftovers of an earlier process (partial archives, staging dirs) are
    /// swept here, so build one pipeline per data directory.
    pub fn new(store: InstallStore, temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(1800)) // 30 minutes
            .build()?;

        let pipeline = Self {
            client,
            store,
            temp_dir: temp_dir.into(),
        };
        pipeline.sweep_leftovers();
        Ok(pipeline)
    }

    /// Delete `*.zip.part` files and staging directories nobody owns anymore
    fn sweep_leftovers(&self) {
        let staging = self.store.staging_dir();
        if staging.exists() {
            match std::fs::remove_dir_all(&staging) {
                Ok(()) => log::info!("[Downloader] Removed stale staging dir {:?}", staging),
                Err(e) => log::warn!("[Downloader] Could not clear {:?}: {}", staging, e),
            }
        }

        let Ok(entries) = std::fs::read_dir(&self.temp_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));
            if is_partial {
                log::info!("[Downloader] Removing stale partial download {:?}", path);
                remove_file_quietly(&path);
            }
        }
    }

    pub fn store(&self) -> &InstallStore {
        &self.store
    }

    /// Download, verify and install `model`, reporting progress after each chunk
    pub async fn download<F>(&self, model: &DownloadableModel, on_progress: F) -> Result<PathBuf>
    where
        F: Fn(DownloadTask) + Send + Sync,
    {
        self.download_with_cancel(model, &CancelFlag::new(), on_progress)
            .await
    }

    /// Same as [`download`](Self::download), stopping as soon as `cancel` is set.
    ///
    /// Dropping the returned future also removes the partial archive and any
    /// half-installed bundle, but no terminal progress is reported.
    pub async fn download_with_cancel<F>(
        &self,
        model: &DownloadableModel,
        cancel: &CancelFlag,
        on_progress: F,
    ) -> Result<PathBuf>
    where
        F: Fn(DownloadTask) + Send + Sync,
    {
        let mut reporter = ProgressReporter::new(model, &on_progress);

        if let Err(e) = validate_model_id(&model.id) {
            reporter.failed(&e.to_string());
            return Err(e);
        }

        let mut partial = PartialDownload {
            temp_path: self.temp_dir.join(format!(
                "{}-{}-{}{}",
                model.variant,
                model.id,
                uuid::Uuid::new_v4(),
                PARTIAL_SUFFIX
            )),
            install_dir: self.store.variant_dir(model.variant).join(&model.id),
            gate: InstallGate::default(),
            keep_install: false,
        };

        reporter.downloading(0.0);
        let result = self.run(model, &partial, cancel, &mut reporter).await;

        match result {
            Ok(path) => {
                partial.keep_install = true;
                drop(partial);
                log::info!("[Downloader] Installed {} ({}) at {:?}", model.id, model.variant, path);
                reporter.completed();
                Ok(path)
            }
            Err(e) => {
                drop(partial);
                log::error!("[Downloader] {} ({}) failed: {}", model.id, model.variant, e);
                reporter.failed(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run<F>(
        &self,
        model: &DownloadableModel,
        partial: &PartialDownload,
        cancel: &CancelFlag,
        reporter: &mut ProgressReporter<'_, F>,
    ) -> Result<PathBuf>
    where
        F: Fn(DownloadTask) + Send + Sync,
    {
        let temp_path = partial.temp_path.as_path();
        self.fetch_archive(model, temp_path, cancel, reporter).await?;

        verify_size(temp_path, model.size).await?;
        if !model.checksum.is_empty() {
            verify_checksum(temp_path, &model.checksum).await?;
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        reporter.extracting();
        let zip_path = temp_path.to_path_buf();
        let staging_root = self.store.staging_dir();
        let variant_dir = self.store.variant_dir(model.variant);
        let model_id = model.id.clone();
        let gate = partial.gate.clone();

        tokio::task::spawn_blocking(move || {
            extract_bundle(&zip_path, &staging_root, &variant_dir, &model_id, &gate)
        })
        .await
        .map_err(|e| Error::Extraction(format!("extraction task failed: {}", e)))?
    }

    async fn fetch_archive<F>(
        &self,
        model: &DownloadableModel,
        temp_path: &Path,
        cancel: &CancelFlag,
        reporter: &mut ProgressReporter<'_, F>,
    ) -> Result<()>
    where
        F: Fn(DownloadTask) + Send + Sync,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        log::info!("[Downloader] Downloading {} -> {:?}", model.download_url, temp_path);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(&model.download_url).send() => response?,
        };
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "download failed: HTTP {}",
                response.status()
            )));
        }

        // Fall back to the manifest size when the server omits Content-Length
        let total_size = response
            .content_length()
            .filter(|len| *len > 0)
            .unwrap_or(model.size);

        if let Some(parent) = temp_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(temp_path).await?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        loop {
            // Also wakes on cancel while the server stalls
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                item = stream.next() => item,
            };
            let Some(item) = item else {
                break;
            };

            let chunk = item?;
            let next = downloaded + chunk.len() as u64;
            if next > model.size {
                return Err(Error::Integrity(format!(
                    "download exceeded declared size of {} bytes",
                    model.size
                )));
            }

            file.write_all(&chunk).await?;
            downloaded = next;

            if total_size > 0 {
                reporter.downloading(downloaded as f32 / total_size as f32);
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

async fn verify_size(path: &Path, expected: u64) -> Result<()> {
    let actual = tokio::fs::metadata(path).await?.len();
    if actual != expected {
        return Err(Error::Integrity(format!(
            "download size mismatch: expected {} bytes, got {}",
            expected, actual
        )));
    }
    Ok(())
}

async fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let file_path = path.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || sha256_file(&file_path))
        .await
        .map_err(|e| Error::Integrity(format!("checksum task failed: {}", e)))??;

    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(Error::Integrity(format!(
            "checksum verification failed: expected {}, got {}",
            expected, actual
        )));
    }
    log::info!("[Downloader] SHA256 checksum verified");
    Ok(())
}

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extract into a private staging directory, then move the bundle into place
/// with a single rename so a half-written bundle is never visible.
///
/// Archives normally hold a top-level `{model_id}/` directory; a flat archive
/// is taken as the bundle contents.
fn extract_bundle(
    zip_path: &Path,
    staging_root: &Path,
    variant_dir: &Path,
    model_id: &str,
    gate: &InstallGate,
) -> Result<PathBuf> {
    let staging = staging_root.join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&staging)?;

    let result = extract_archive(zip_path, &staging).and_then(|()| {
        let nested = staging.join(model_id);
        let bundle = if nested.is_dir() { nested } else { staging.clone() };

        let abandoned = gate.lock();
        if *abandoned {
            return Err(Error::Cancelled);
        }
        install_bundle(&bundle, variant_dir, model_id)
    });

    if staging.exists() {
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            log::warn!("[Downloader] Could not clean staging dir {:?}: {}", staging, e);
        }
    }
    result
}

fn extract_archive(zip_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file).map_err(extraction)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(extraction)?;

        let relative = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| Error::Extraction(format!("unsafe entry path: {}", entry.name())))?;
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(extraction)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(extraction)?;
            }
            let mut outfile = File::create(&outpath).map_err(extraction)?;
            std::io::copy(&mut entry, &mut outfile).map_err(extraction)?;
        }
    }
    Ok(())
}

fn extraction(e: impl std::fmt::Display) -> Error {
    Error::Extraction(e.to_string())
}

fn install_bundle(bundle: &Path, variant_dir: &Path, model_id: &str) -> Result<PathBuf> {
    let is_empty = std::fs::read_dir(bundle)?.next().is_none();
    if is_empty {
        return Err(Error::Extraction(format!("archive for {} is empty", model_id)));
    }

    std::fs::create_dir_all(variant_dir)?;
    let target = variant_dir.join(model_id);
    if target.exists() {
        std::fs::remove_dir_all(&target)?;
    }
    std::fs::rename(bundle, &target)
        .map_err(|e| Error::Extraction(format!("could not move bundle into place: {}", e)))?;
    Ok(target)
}

fn remove_file_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("[Downloader] Could not delete temp file {:?}: {}", path, e);
        }
    }
}

/// Set once a download is abandoned. The final rename into the install
/// store happens under this lock, so it either lands before the cleanup
/// (and is removed) or sees the flag and is skipped.
#[derive(Clone, Default)]
struct InstallGate(Arc<Mutex<bool>>);

impl InstallGate {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// On-disk state of one download attempt. Dropping it deletes the archive
/// and, unless the install was kept, the bundle directory too.
struct PartialDownload {
    temp_path: PathBuf,
    install_dir: PathBuf,
    gate: InstallGate,
    keep_install: bool,
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        remove_file_quietly(&self.temp_path);
        if self.keep_install {
            return;
        }

        let mut abandoned = self.gate.lock();
        *abandoned = true;
        if let Err(e) = std::fs::remove_dir_all(&self.install_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "[Downloader] Could not remove partial install {:?}: {}",
                    self.install_dir,
                    e
                );
            }
        }
    }
}
