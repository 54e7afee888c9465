/**
 * Translation Orchestrator
 *
 * Routes a request to the online service or the offline engine session.
 * Offline requests resolve `"auto"` through the language detector and check
 * the install store before the engine is touched.
 */
use std::sync::Arc;

use super::remote::RemoteTranslator;
use crate::downloads::InstallStore;
use crate::engine::{Detection, EngineSession, LanguageDetector, NativeEngine};
use crate::error::{Error, Result};
use crate::models::{is_supported, Variant, AUTO_DETECT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationMode {
    Online,
    Offline(Variant),
}

pub struct TranslationOrchestrator<E: NativeEngine> {
    remote: Arc<dyn RemoteTranslator>,
    detector: Arc<dyn LanguageDetector>,
    session: EngineSession<E>,
    store: InstallStore,
}

impl<E: NativeEngine> TranslationOrchestrator<E> {
    pub fn new(
        remote: Arc<dyn RemoteTranslator>,
        detector: Arc<dyn LanguageDetector>,
        engine: E,
        store: InstallStore,
    ) -> Self {
        Self {
            remote,
            detector,
            session: EngineSession::new(engine, store.clone()),
            store,
        }
    }

    pub fn session(&self) -> &EngineSession<E> {
        &self.session
    }

    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        mode: TranslationMode,
    ) -> Result<String> {
        let variant = match mode {
            TranslationMode::Online => return self.remote.translate(text, source, target).await,
            TranslationMode::Offline(variant) => variant,
        };

        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let source = if source == AUTO_DETECT {
            let detection = self.detect(text).await?;
            log::debug!(
                "[Orchestrator] Detected {} ({}%, reliable: {})",
                detection.lang,
                detection.confidence,
                detection.is_reliable
            );
            if !is_supported(&detection.lang) {
                return Err(Error::UnsupportedLanguage(detection.lang));
            }
            detection.lang
        } else {
            source.to_string()
        };

        let pair_id = format!("{}-{}", source, target);
        let installed = self.store.list_installed()?;
        let available = installed
            .get(&pair_id)
            .is_some_and(|variants| variants.contains(&variant));
        if !available {
            return Err(Error::ModelNotFound {
                source_code: source,
                target_code: target.to_string(),
                variant,
            });
        }

        self.session.translate(text, &source, target, variant).await
    }

    /// Run the detector off the async workers
    pub async fn detect(&self, text: &str) -> Result<Detection> {
        let detector = Arc::clone(&self.detector);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || detector.detect(&text, None))
            .await
            .map_err(|e| Error::Translation(format!("detection task failed: {}", e)))?
    }

    /// Release the native engine
    pub async fn shutdown(&self) -> Result<()> {
        self.session.shutdown().await
    }
}
