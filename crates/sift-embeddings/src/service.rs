//! Model lifecycle and query/document embedding.
//!
//! [`EmbeddingService`] owns one model for its whole lifetime. The model is
//! built lazily by the first [`EmbeddingService::load`] call; callers that
//! arrive while a load is in flight wait for that same attempt instead of
//! starting another. A failed load leaves the service in
//! [`ModelState::Failed`] and the next `load` tries again.
//!
//! Once ready, [`EmbeddingService::embed`] prefixes the query and documents
//! for the retrieval task, runs one batched inference call, and ranks the
//! documents against the query.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, trace, warn};

use crate::config::EmbeddingConfig;
use crate::errors::{EmbeddingError, Result};
use crate::gateway::{GatewayLoader, LoadingProgress, ModelGateway, ProgressSink, loader_for};
use crate::ranking::{RankedDocument, rank};

/// Prepended to every query before inference.
///
/// Part of the embedding protocol: vectors produced with a different prefix
/// are not comparable.
pub const QUERY_PREFIX: &str = "task: search result | query: ";

/// Prepended to every document before inference.
pub const DOCUMENT_PREFIX: &str = "title: none | text: ";

/// Lifecycle of the model behind an [`EmbeddingService`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ModelState {
    /// No load has been attempted.
    #[default]
    Unloaded,
    /// A load is in flight; carries the latest progress update, if any.
    Loading(Option<LoadingProgress>),
    /// The model is usable.
    Ready,
    /// The last load failed; `load` may be called again.
    Failed(String),
}

impl ModelState {
    /// Whether embedding calls are accepted.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Short human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unloaded => "not loaded",
            Self::Loading(_) => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Result of one [`EmbeddingService::embed`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbedOutput {
    /// Embedding of the prefixed query.
    pub query_embedding: Vec<f32>,
    /// One embedding per input document, in input order.
    pub document_embeddings: Vec<Vec<f32>>,
    /// Documents ranked by similarity to the query. Empty when no documents
    /// were given.
    pub ranked_documents: Vec<RankedDocument>,
}

/// Owner of the model and its lifecycle.
pub struct EmbeddingService {
    loader: Arc<dyn GatewayLoader>,
    state: Arc<watch::Sender<ModelState>>,
    gateway: RwLock<Option<Arc<dyn ModelGateway>>>,
    dimensions: OnceLock<usize>,
    inference: Mutex<()>,
}

impl EmbeddingService {
    /// Create an unloaded service that will build its model with `loader`.
    pub fn new(loader: Arc<dyn GatewayLoader>) -> Self {
        let (state, _) = watch::channel(ModelState::Unloaded);
        Self {
            loader,
            state: Arc::new(state),
            gateway: RwLock::new(None),
            dimensions: OnceLock::new(),
            inference: Mutex::new(()),
        }
    }

    /// Create an unloaded service for the configured backend.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(loader_for(config)?))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change, including progress.
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state.subscribe()
    }

    /// Whether embedding calls are accepted.
    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    /// Vector width, known after the first successful inference.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }

    /// Make the model ready, building it if needed.
    ///
    /// - Ready: returns immediately.
    /// - Loading: waits for the in-flight attempt and returns its outcome.
    /// - Unloaded or Failed: builds the model, forwarding every progress
    ///   update to `on_progress`.
    ///
    /// At most one construction runs at a time, and a successful one is
    /// never repeated.
    pub async fn load<F>(&self, on_progress: F) -> Result<()>
    where
        F: Fn(&LoadingProgress) + Send + Sync + 'static,
    {
        let leader = self.state.send_if_modified(|state| {
            if matches!(state, ModelState::Unloaded | ModelState::Failed(_)) {
                *state = ModelState::Loading(None);
                true
            } else {
                false
            }
        });
        if !leader {
            return self.join_load(&on_progress).await;
        }

        info!("loading embedding model");
        let mut guard = LoadGuard {
            state: &self.state,
            armed: true,
        };
        let result = self.loader.load(self.progress_sink(on_progress)).await;
        guard.armed = false;

        match result {
            Ok(gateway) => {
                info!(model = gateway.model_id(), "embedding model ready");
                *self.gateway.write() = Some(gateway);
                self.state.send_modify(|s| *s = ModelState::Ready);
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    EmbeddingError::Initialization(reason) => reason,
                    other => other.to_string(),
                };
                warn!(error = %reason, "embedding model failed to load");
                self.state
                    .send_modify(|s| *s = ModelState::Failed(reason.clone()));
                Err(EmbeddingError::Initialization(reason))
            }
        }
    }

    /// Wait on a load started by another caller.
    async fn join_load<F>(&self, on_progress: &F) -> Result<()>
    where
        F: Fn(&LoadingProgress) + Send + Sync,
    {
        let mut rx = self.state.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                ModelState::Ready => return Ok(()),
                ModelState::Failed(reason) => return Err(EmbeddingError::Initialization(reason)),
                ModelState::Loading(Some(progress)) => on_progress(&progress),
                ModelState::Loading(None) => {}
                ModelState::Unloaded => {
                    return Err(EmbeddingError::Internal("model load abandoned".into()));
                }
            }
            rx.changed()
                .await
                .map_err(|_| EmbeddingError::Internal("model state channel closed".into()))?;
        }
    }

    /// Sink that publishes progress into the state and forwards it.
    fn progress_sink<F>(&self, on_progress: F) -> ProgressSink
    where
        F: Fn(&LoadingProgress) + Send + Sync + 'static,
    {
        let state = Arc::clone(&self.state);
        Arc::new(move |progress: LoadingProgress| {
            trace!(
                status = progress.status.as_str(),
                file = %progress.file,
                percent = progress.percent(),
                "model loading progress"
            );
            on_progress(&progress);
            let _ = state.send_if_modified(|s| {
                if s.is_loading() {
                    *s = ModelState::Loading(Some(progress));
                    true
                } else {
                    false
                }
            });
        })
    }

    /// Embed a query and documents in one inference call and rank the
    /// documents against the query.
    ///
    /// Fails with [`EmbeddingError::NotReady`] before the model is ready,
    /// without touching the model.
    pub async fn embed(&self, query: &str, documents: &[String]) -> Result<EmbedOutput> {
        let gateway = self.ready_gateway()?;

        let mut batch = Vec::with_capacity(documents.len() + 1);
        batch.push(format!("{QUERY_PREFIX}{query}"));
        batch.extend(documents.iter().map(|d| format!("{DOCUMENT_PREFIX}{d}")));

        let vectors = {
            let _inference = self.inference.lock().await;
            debug!(documents = documents.len(), "running embedding batch");
            gateway.embed_texts(&batch).await
        }
        .inspect_err(|e| warn!(error = %e, "embedding batch failed"))?;
        self.check_output(&vectors, batch.len())?;

        let mut vectors = vectors.into_iter();
        let query_embedding = vectors
            .next()
            .ok_or_else(|| EmbeddingError::Inference("missing query embedding".into()))?;
        let document_embeddings: Vec<Vec<f32>> = vectors.collect();

        let ranked_documents = if documents.is_empty() {
            Vec::new()
        } else {
            rank(&query_embedding, &document_embeddings, documents)?
        };

        Ok(EmbedOutput {
            query_embedding,
            document_embeddings,
            ranked_documents,
        })
    }

    /// Embed a query on its own.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        Ok(self.embed(query, &[]).await?.query_embedding)
    }

    /// Embed a single document.
    pub async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed("", &[text.to_string()])
            .await?
            .document_embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Inference("missing document embedding".into()))
    }

    fn ready_gateway(&self) -> Result<Arc<dyn ModelGateway>> {
        if !self.is_ready() {
            return Err(EmbeddingError::NotReady);
        }
        self.gateway.read().clone().ok_or(EmbeddingError::NotReady)
    }

    /// Count must match the batch, every vector must be finite and share
    /// the model's width. The width is fixed by the first batch that passes.
    fn check_output(&self, vectors: &[Vec<f32>], expected: usize) -> Result<()> {
        if vectors.len() != expected {
            return Err(EmbeddingError::Inference(format!(
                "expected {expected} embeddings, got {}",
                vectors.len()
            )));
        }
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        if first.is_empty() {
            return Err(EmbeddingError::Inference("model returned empty vectors".into()));
        }
        let dims = self.dimensions.get().copied().unwrap_or(first.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(EmbeddingError::Inference(format!(
                "embedding dimension {} does not match model dimension {dims}",
                bad.len()
            )));
        }
        if let Some(i) = vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
            return Err(EmbeddingError::Inference(format!(
                "embedding {i} has non-finite components"
            )));
        }
        let _ = self.dimensions.set(dims);
        Ok(())
    }
}

/// Marks the service failed if a leader's load future is dropped midway.
struct LoadGuard<'a> {
    state: &'a watch::Sender<ModelState>,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("embedding model load cancelled");
            self.state
                .send_modify(|s| *s = ModelState::Failed("model load cancelled".into()));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
