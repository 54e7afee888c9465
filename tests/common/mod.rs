#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use transkit_lib::config::{ConfigManager, RepositoryConfig};
use transkit_lib::downloads::Clock;
use transkit_lib::models::{DownloadableModel, Lang, Variant};
use transkit_lib::paths::AppDirs;
use transkit_lib::AppContext;

const CHUNK_SIZE: usize = 64;

#[derive(Default)]
pub struct FixtureState {
    pub metadata: Mutex<String>,
    pub archives: Mutex<HashMap<String, Vec<u8>>>,
    pub metadata_hits: AtomicUsize,
    pub archive_hits: AtomicUsize,
    /// Delay before answering metadata requests
    pub metadata_delay_ms: AtomicU64,
    /// When non-zero, archives are streamed in small chunks with this delay
    pub chunk_delay_ms: AtomicU64,
    /// Send the first chunk of each archive, then hold the connection open
    pub stall: AtomicBool,
}

/// In-process repository host serving `metadata.json` and model archives
pub struct FixtureServer {
    pub base_url: String,
    pub state: Arc<FixtureState>,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let state = Arc::new(FixtureState::default());
        let app = Router::new()
            .route("/main/metadata.json", get(metadata))
            .route("/main/:variant/:file", get(archive))
            .route("/lfs/refs/heads/main/:variant/:file", get(archive))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn config(&self) -> RepositoryConfig {
        RepositoryConfig {
            base_url: self.base_url.clone(),
            lfs_base_url: format!("{}/lfs", self.base_url),
            ..Default::default()
        }
    }

    pub fn set_metadata(&self, json: &str) {
        *self.state.metadata.lock().unwrap() = json.to_string();
    }

    /// Serve `bytes` as `{variant}/{id}.zip` and describe it in metadata.json
    pub fn publish(&self, variant: Variant, id: &str, bytes: Vec<u8>) -> DownloadableModel {
        let model = self.model_for(variant, id, &bytes);
        self.state
            .archives
            .lock()
            .unwrap()
            .insert(format!("{}/{}.zip", variant, id), bytes);
        self.rebuild_metadata();
        model
    }

    pub fn model_for(&self, variant: Variant, id: &str, bytes: &[u8]) -> DownloadableModel {
        let (source, target) = id.split_once('-').unwrap();
        DownloadableModel {
            id: id.to_string(),
            source_lang: Lang::from_code(source),
            target_lang: Lang::from_code(target),
            download_url: self.config().download_url(variant, id),
            size: bytes.len() as u64,
            checksum: sha256_hex(bytes),
            variant,
        }
    }

    pub fn metadata_hits(&self) -> usize {
        self.state.metadata_hits.load(Ordering::SeqCst)
    }

    pub fn archive_hits(&self) -> usize {
        self.state.archive_hits.load(Ordering::SeqCst)
    }

    pub fn slow_down(&self, chunk_delay_ms: u64) {
        self.state.chunk_delay_ms.store(chunk_delay_ms, Ordering::SeqCst);
    }

    pub fn stall(&self) {
        self.state.stall.store(true, Ordering::SeqCst);
    }

    fn rebuild_metadata(&self) {
        let archives = self.state.archives.lock().unwrap();
        let mut lite = serde_json::Map::new();
        let mut full = serde_json::Map::new();
        for (key, bytes) in archives.iter() {
            let (variant, file) = key.split_once('/').unwrap();
            let id = file.trim_end_matches(".zip");
            let entry = serde_json::json!({ "checksum": sha256_hex(bytes), "size": bytes.len() });
            match variant {
                "lite" => lite.insert(id.to_string(), entry),
                _ => full.insert(id.to_string(), entry),
            };
        }
        *self.state.metadata.lock().unwrap() =
            serde_json::json!({ "lite": lite, "full": full }).to_string();
    }
}

async fn metadata(State(state): State<Arc<FixtureState>>) -> Response {
    state.metadata_hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.metadata_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let body = state.metadata.lock().unwrap().clone();
    (StatusCode::OK, body).into_response()
}

async fn archive(
    State(state): State<Arc<FixtureState>>,
    Path((variant, file)): Path<(String, String)>,
) -> Response {
    state.archive_hits.fetch_add(1, Ordering::SeqCst);
    let key = format!("{}/{}", variant, file);
    let Some(bytes) = state.archives.lock().unwrap().get(&key).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if state.stall.load(Ordering::SeqCst) {
        let first = bytes[..CHUNK_SIZE.min(bytes.len())].to_vec();
        let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(first)])
            .chain(futures_util::stream::pending());
        return Body::from_stream(stream).into_response();
    }

    let delay = state.chunk_delay_ms.load(Ordering::SeqCst);
    if delay == 0 {
        return bytes.into_response();
    }

    // Chunked transfer: no Content-Length header
    let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(|c| c.to_vec()).collect();
    let stream = futures_util::stream::iter(chunks).then(move |chunk| async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, std::io::Error>(chunk)
    });
    Body::from_stream(stream).into_response()
}

/// Zip with a top-level `{id}/` directory, as the repository publishes them
pub fn zip_bundle(id: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, data) in files {
        writer.start_file(format!("{}/{}", id, name), options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A bundle large enough to span many transfer chunks
pub fn large_bundle(id: &str) -> Vec<u8> {
    let weights: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(format!("{}/model.bin", id), options).unwrap();
    writer.write_all(&weights).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// App context on a temp dir, pointed at the fixture server
pub fn test_context(server: &FixtureServer) -> (TempDir, AppContext) {
    let temp_dir = TempDir::new().unwrap();
    let dirs = AppDirs::new(temp_dir.path());
    ConfigManager::new(&dirs.config_dir())
        .save(&server.config())
        .unwrap();
    let ctx = AppContext::new(dirs).unwrap();
    (temp_dir, ctx)
}

/// Clock the tests move by hand
#[derive(Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ms)))
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
