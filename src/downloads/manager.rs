/**
 * Download Manager
 *
 * Runs pipeline downloads as background tasks. One task per
 * `(model_id, variant)`; a second `start` for the same key joins the task
 * already running instead of downloading twice.
 */
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use super::downloader::DownloadPipeline;
use super::progress::{CancelFlag, DownloadTask};
use crate::models::{DownloadableModel, ModelPair, Variant};

type DownloadKey = (String, Variant);

#[derive(Clone)]
struct ActiveDownload {
    progress: watch::Receiver<DownloadTask>,
    cancel: CancelFlag,
}

pub struct DownloadManager {
    pipeline: Arc<DownloadPipeline>,
    active: Arc<Mutex<HashMap<DownloadKey, ActiveDownload>>>,
}

impl DownloadManager {
    pub fn new(pipeline: DownloadPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn pipeline(&self) -> &DownloadPipeline {
        &self.pipeline
    }

    /// Start downloading `model` in the background. Must be called within a tokio runtime.
    pub fn start(&self, model: DownloadableModel) -> DownloadHandle {
        let key: DownloadKey = (model.id.clone(), model.variant);

        let mut active = lock(&self.active);
        if let Some(existing) = active.get(&key) {
            log::info!(
                "[DownloadManager] {} ({}) already downloading, joining",
                model.id,
                model.variant
            );
            return DownloadHandle::new(&key, existing.clone());
        }

        let (tx, rx) = watch::channel(DownloadTask::downloading(&model, 0.0));
        let entry = ActiveDownload {
            progress: rx,
            cancel: CancelFlag::new(),
        };
        active.insert(key.clone(), entry.clone());
        drop(active);

        let handle = DownloadHandle::new(&key, entry.clone());
        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.active);

        tokio::spawn(async move {
            let on_progress = |task: DownloadTask| {
                // Deregister before publishing the terminal state so a caller
                // that saw it can immediately start the same key again
                if task.status.is_terminal() {
                    lock(&registry).remove(&key);
                }
                tx.send_replace(task);
            };

            if let Err(e) = pipeline
                .download_with_cancel(&model, &entry.cancel, on_progress)
                .await
            {
                log::debug!("[DownloadManager] Task for {} ended: {}", model.id, e);
            }
        });

        handle
    }

    /// Start both directions of a pair
    pub fn install_pair(
        &self,
        pair: &ModelPair<DownloadableModel>,
    ) -> (DownloadHandle, DownloadHandle) {
        (
            self.start(pair.forward.clone()),
            self.start(pair.reverse.clone()),
        )
    }

    /// Latest progress of every running download
    pub fn active(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<DownloadTask> = lock(&self.active)
            .values()
            .map(|entry| entry.progress.borrow().clone())
            .collect();
        tasks.sort_by(|a, b| (&a.model_id, a.variant).cmp(&(&b.model_id, b.variant)));
        tasks
    }

    pub fn is_active(&self, model_id: &str, variant: Variant) -> bool {
        lock(&self.active).contains_key(&(model_id.to_string(), variant))
    }

    /// Request cancellation of a running download. Returns false if none is running.
    pub fn cancel(&self, model_id: &str, variant: Variant) -> bool {
        match lock(&self.active).get(&(model_id.to_string(), variant)) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Observer of one background download
pub struct DownloadHandle {
    model_id: String,
    variant: Variant,
    progress: watch::Receiver<DownloadTask>,
    cancel: CancelFlag,
}

impl DownloadHandle {
    fn new(key: &DownloadKey, entry: ActiveDownload) -> Self {
        Self {
            model_id: key.0.clone(),
            variant: key.1,
            progress: entry.progress,
            cancel: entry.cancel,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn current(&self) -> DownloadTask {
        self.progress.borrow().clone()
    }

    /// A receiver that sees every state change of this download
    pub fn progress(&self) -> watch::Receiver<DownloadTask> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for `Completed` or `Failed` and return that final state
    pub async fn finish(mut self) -> DownloadTask {
        let finished = self
            .progress
            .wait_for(|task| task.status.is_terminal())
            .await
            .map(|task| task.clone());

        // The task only drops its sender after publishing a terminal state
        finished.unwrap_or_else(|_| self.progress.borrow().clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
