//! Cancellable trailing-edge debounce.
//!
//! Every [`Debouncer::schedule`] call starts a new epoch and aborts the
//! timer of the previous one. When a timer survives its quiet period and
//! its epoch is still the latest, the task is spawned on its own, so a task
//! that has started is never aborted by later calls. Tasks receive their
//! epoch and can ask [`Debouncer::is_current`] before publishing results.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Runs only the most recently scheduled task, after a quiet period.
#[derive(Default)]
pub struct Debouncer {
    epoch: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create an idle debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless another call supersedes it first.
    ///
    /// Must be called from within a tokio runtime. Returns the epoch handed
    /// to `task`.
    pub fn schedule<F, Fut>(&self, delay: Duration, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.epoch);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) == epoch {
                drop(tokio::spawn(task(epoch)));
            }
        });
        if let Some(previous) = self.pending.lock().replace(timer) {
            previous.abort();
        }
        epoch
    }

    /// Drop the pending task, if any, and invalidate running ones.
    pub fn cancel(&self) {
        let _ = self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = self.pending.lock().take() {
            pending.abort();
        }
    }

    /// Whether `epoch` is still the latest scheduled or cancelled epoch.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.abort();
        }
    }
}
