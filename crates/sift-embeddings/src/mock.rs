//! Scriptable gateway and loader for tests.
//!
//! [`MockLoader`] counts constructions and can be told to fail or stall;
//! [`MockGateway`] records every batch it receives and produces hashing
//! vectors, so similarity still follows shared vocabulary.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::{EmbeddingError, Result};
use crate::gateway::{GatewayLoader, LoadingProgress, LoadingStatus, ModelGateway, ProgressSink};
use crate::hashing::HashingGateway;

/// Width of mock vectors unless overridden.
pub const MOCK_DIMENSIONS: usize = 64;

/// Gateway that records calls and can inject failures.
pub struct MockGateway {
    dimensions: AtomicUsize,
    calls: Mutex<Vec<Vec<String>>>,
    fail_next: AtomicUsize,
    drop_last_vector: AtomicUsize,
    widen_first_vector: AtomicUsize,
    poison_next: AtomicUsize,
    delay: Mutex<Duration>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            dimensions: AtomicUsize::new(MOCK_DIMENSIONS),
            calls: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            drop_last_vector: AtomicUsize::new(0),
            widen_first_vector: AtomicUsize::new(0),
            poison_next: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl MockGateway {
    /// Batches received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Number of `embed_texts` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Make the next `n` calls fail with an inference error.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls return one vector too few.
    pub fn drop_last_vector(&self, n: usize) {
        self.drop_last_vector.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls return a first vector one component wider
    /// than the rest.
    pub fn widen_first_vector(&self, n: usize) {
        self.widen_first_vector.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls put a NaN into their last vector.
    pub fn poison_next(&self, n: usize) {
        self.poison_next.store(n, Ordering::SeqCst);
    }

    /// Change the width of subsequent vectors.
    pub fn set_dimensions(&self, dimensions: usize) {
        self.dimensions.store(dimensions, Ordering::SeqCst);
    }

    /// Sleep this long inside every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().push(texts.to_vec());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if take_one(&self.fail_next) {
            return Err(EmbeddingError::Inference("injected failure".into()));
        }

        let hashing = HashingGateway::new(self.dimensions.load(Ordering::SeqCst))?;
        let mut out: Vec<Vec<f32>> = texts.iter().map(|t| hashing.embed_one(t)).collect();
        if take_one(&self.drop_last_vector) {
            let _ = out.pop();
        }
        if take_one(&self.widen_first_vector) {
            if let Some(first) = out.first_mut() {
                first.push(0.0);
            }
        }
        if take_one(&self.poison_next) {
            if let Some(x) = out.last_mut().and_then(|v| v.first_mut()) {
                *x = f32::NAN;
            }
        }
        Ok(out)
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

/// Loader that hands out one shared [`MockGateway`].
pub struct MockLoader {
    gateway: Arc<MockGateway>,
    constructions: AtomicUsize,
    fail_next: AtomicUsize,
    delay: Mutex<Duration>,
}

impl Default for MockLoader {
    fn default() -> Self {
        Self {
            gateway: Arc::new(MockGateway::default()),
            constructions: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl MockLoader {
    /// The gateway every successful load returns.
    pub fn gateway(&self) -> Arc<MockGateway> {
        Arc::clone(&self.gateway)
    }

    /// How many times `load` has been entered.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Make the next `n` loads fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Sleep this long between progress updates.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl GatewayLoader for MockLoader {
    async fn load(&self, progress: ProgressSink) -> Result<Arc<dyn ModelGateway>> {
        let _ = self.constructions.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();

        progress(LoadingProgress::new(LoadingStatus::Initiate, "model.onnx", 0.0));
        tokio::time::sleep(delay).await;
        progress(LoadingProgress::new(LoadingStatus::Progress, "model.onnx", 50.0));
        tokio::time::sleep(delay).await;

        if take_one(&self.fail_next) {
            return Err(EmbeddingError::Initialization("injected load failure".into()));
        }

        progress(LoadingProgress::new(LoadingStatus::Done, "model.onnx", 100.0));
        progress(LoadingProgress::new(LoadingStatus::Ready, "mock", 100.0));
        Ok(self.gateway())
    }
}
