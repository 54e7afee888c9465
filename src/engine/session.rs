/**
 * Engine Session
 *
 * Owns the single native translation engine instance. The loaded
 * `(source, target, variant)` is remembered so repeated requests for the
 * same pair reuse the instance; any other request tears it down and loads
 * the new bundle. Every native call runs under one mutex on a blocking
 * worker, so native calls never overlap.
 */
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::native::NativeEngine;
use crate::downloads::InstallStore;
use crate::error::{Error, Result};
use crate::models::Variant;

/// The pair and variant an engine instance was initialised with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineKey {
    pub source: String,
    pub target: String,
    pub variant: Variant,
}

impl EngineKey {
    pub fn new(source: &str, target: &str, variant: Variant) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            variant,
        }
    }

    pub fn pair_id(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready(EngineKey),
    Failed,
}

enum Slot<H> {
    Uninitialized,
    Ready { key: EngineKey, handle: H },
    Failed,
}

struct SessionInner<E: NativeEngine> {
    engine: E,
    slot: Slot<E::Handle>,
}

impl<E: NativeEngine> SessionInner<E> {
    fn translate(&mut self, key: EngineKey, model_dir: &Path, text: &str) -> Result<String> {
        let loaded = matches!(&self.slot, Slot::Ready { key: current, .. } if *current == key);
        if !loaded {
            self.load(key, model_dir)?;
        }
        self.translate_loaded(text)
    }

    fn load(&mut self, key: EngineKey, model_dir: &Path) -> Result<()> {
        self.teardown();
        log::info!(
            "[EngineSession] Loading {} ({}) from {:?}",
            key.pair_id(),
            key.variant,
            model_dir
        );

        let Some(mut handle) = self.engine.create() else {
            self.slot = Slot::Failed;
            return Err(Error::EngineInit("native engine could not be created".to_string()));
        };

        if !self.engine.init(&mut handle, model_dir) {
            self.engine.destroy(handle);
            self.slot = Slot::Failed;
            return Err(Error::EngineInit(format!(
                "could not load {} {} model from {:?}",
                key.pair_id(),
                key.variant,
                model_dir
            )));
        }

        self.slot = Slot::Ready { key, handle };
        Ok(())
    }

    fn translate_loaded(&mut self, text: &str) -> Result<String> {
        let Slot::Ready { handle, .. } = &mut self.slot else {
            return Err(Error::EngineNotReady);
        };

        match self.engine.translate(handle, text) {
            Ok(translated) => Ok(translated),
            Err(message) => {
                // Native state is unknown after a failure, force a reload next time
                self.teardown();
                self.slot = Slot::Failed;
                Err(Error::Translation(message))
            }
        }
    }

    fn teardown(&mut self) {
        if let Slot::Ready { key, handle } = std::mem::replace(&mut self.slot, Slot::Uninitialized) {
            log::info!("[EngineSession] Releasing {} ({})", key.pair_id(), key.variant);
            self.engine.destroy(handle);
        }
    }

    fn state(&self) -> EngineState {
        match &self.slot {
            Slot::Uninitialized => EngineState::Uninitialized,
            Slot::Ready { key, .. } => EngineState::Ready(key.clone()),
            Slot::Failed => EngineState::Failed,
        }
    }
}

impl<E: NativeEngine> Drop for SessionInner<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub struct EngineSession<E: NativeEngine> {
    inner: Arc<Mutex<SessionInner<E>>>,
    store: InstallStore,
}

impl<E: NativeEngine> EngineSession<E> {
    pub fn new(engine: E, store: InstallStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                engine,
                slot: Slot::Uninitialized,
            })),
            store,
        }
    }

    /// Translate with the `(source, target, variant)` bundle, loading it first if
    /// a different one (or none) is active
    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        variant: Variant,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let key = EngineKey::new(source, target, variant);
        let model_dir = self.model_dir(&key)?;
        let text = text.to_string();

        self.run(move |inner| inner.translate(key, &model_dir, &text))
            .await
    }

    /// Translate with whatever bundle is loaded
    pub async fn translate_current(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let text = text.to_string();
        self.run(move |inner| inner.translate_loaded(&text)).await
    }

    /// Release the native instance. Safe to call repeatedly.
    pub async fn shutdown(&self) -> Result<()> {
        self.run(|inner| {
            inner.teardown();
            Ok(())
        })
        .await
    }

    pub fn state(&self) -> EngineState {
        lock(&self.inner).map(|inner| inner.state()).unwrap_or(EngineState::Failed)
    }

    /// The bundle must be on disk before any native call is made
    fn model_dir(&self, key: &EngineKey) -> Result<PathBuf> {
        let path = self.store.model_path(&key.pair_id(), key.variant)?;
        if !self.store.is_installed(&key.pair_id(), key.variant) {
            return Err(Error::ModelNotFound {
                source_code: key.source.clone(),
                target_code: key.target.clone(),
                variant: key.variant,
            });
        }
        Ok(path)
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionInner<E>) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&inner)?;
            op(&mut guard)
        })
        .await
        .map_err(|e| Error::Translation(format!("engine task failed: {}", e)))?
    }
}

fn lock<E: NativeEngine>(inner: &Mutex<SessionInner<E>>) -> Result<MutexGuard<'_, SessionInner<E>>> {
    inner
        .lock()
        .map_err(|_| Error::Translation("engine session lock poisoned".to_string()))
}
