/**
 * Progress Reporting Module
 *
 * Per-model download state. Every task carries its own `(model_id, variant)`
 * key so concurrent downloads never share a counter.
 */
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::models::{DownloadableModel, Variant};

/// Download status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloading,
    Extracting,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Progress information for a single model download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadTask {
    pub model_id: String,
    pub variant: Variant,
    pub status: DownloadStatus,
    /// Fraction in [0, 1]
    pub progress: f32,
    /// Failure reason, set only on `Failed`
    pub message: Option<String>,
}

impl DownloadTask {
    pub fn downloading(model: &DownloadableModel, progress: f32) -> Self {
        Self::new(model, DownloadStatus::Downloading, progress)
    }

    pub fn extracting(model: &DownloadableModel) -> Self {
        Self::new(model, DownloadStatus::Extracting, 1.0)
    }

    pub fn completed(model: &DownloadableModel) -> Self {
        Self::new(model, DownloadStatus::Completed, 1.0)
    }

    /// Failed keeps the last reported fraction so the sequence never goes backwards
    pub fn failed(model: &DownloadableModel, progress: f32, error: &str) -> Self {
        Self {
            message: Some(error.to_string()),
            ..Self::new(model, DownloadStatus::Failed, progress)
        }
    }

    /// Get progress percentage (0-100)
    pub fn percentage(&self) -> f32 {
        self.progress * 100.0
    }

    fn new(model: &DownloadableModel, status: DownloadStatus, progress: f32) -> Self {
        Self {
            model_id: model.id.clone(),
            variant: model.variant,
            status,
            progress: progress.clamp(0.0, 1.0),
            message: None,
        }
    }
}

/// Cancellation flag owned by one download task. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Wraps a progress callback and keeps reported fractions non-decreasing
pub(crate) struct ProgressReporter<'a, F> {
    model: &'a DownloadableModel,
    callback: &'a F,
    last: f32,
}

impl<'a, F> ProgressReporter<'a, F>
where
    F: Fn(DownloadTask) + Send + Sync,
{
    pub(crate) fn new(model: &'a DownloadableModel, callback: &'a F) -> Self {
        Self {
            model,
            callback,
            last: 0.0,
        }
    }

    pub(crate) fn downloading(&mut self, fraction: f32) {
        self.last = self.last.max(fraction.clamp(0.0, 1.0));
        (self.callback)(DownloadTask::downloading(self.model, self.last));
    }

    pub(crate) fn extracting(&mut self) {
        self.last = 1.0;
        (self.callback)(DownloadTask::extracting(self.model));
    }

    pub(crate) fn completed(&mut self) {
        self.last = 1.0;
        (self.callback)(DownloadTask::completed(self.model));
    }

    pub(crate) fn failed(&mut self, error: &str) {
        (self.callback)(DownloadTask::failed(self.model, self.last, error));
    }
}
