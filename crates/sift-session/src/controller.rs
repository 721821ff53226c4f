//! Session controller: documents, query, and ranking results over one
//! shared [`EmbeddingService`].
//!
//! All session data lives in a single [`SessionState`] published through a
//! `watch` channel. Every mutation is one `send_modify` call, so observers
//! never see a document without its slot in the embedding view or a
//! half-applied compare.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sift_embeddings::{EmbeddingService, LoadingProgress, ModelState, RankedDocument, Result};
use sift_settings::SessionSettings;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;

/// Session-unique document identifier.
///
/// Asynchronous embedding results are routed by id, so removing an earlier
/// document while an embed is in flight cannot misattribute the vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// A user-supplied document and its embedding, once computed.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Stable identifier.
    pub id: DocumentId,
    /// Trimmed text.
    pub text: String,
    /// Embedding of the prefixed text; `None` until the embed completes.
    pub embedding: Option<Vec<f32>>,
}

/// Whether a compare is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Ready for a compare.
    #[default]
    Idle,
    /// A compare is in flight; further compares are skipped.
    Comparing,
}

/// Mutable session data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    /// Raw query text as last entered.
    pub query: String,
    /// Documents in insertion order.
    pub documents: Vec<Document>,
    /// Embedding of the current query, from live embedding or the last
    /// compare.
    pub query_embedding: Option<Vec<f32>>,
    /// Ranking from the last successful compare.
    pub ranked_results: Vec<RankedDocument>,
    /// Message from the most recent failed operation.
    pub last_error: Option<String>,
    /// Compare phase.
    pub phase: Phase,
}

impl SessionState {
    /// Embedding view aligned with [`Self::documents`].
    pub fn document_embeddings(&self) -> Vec<Option<&[f32]>> {
        self.documents
            .iter()
            .map(|d| d.embedding.as_deref())
            .collect()
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    /// Model lifecycle state.
    pub model_state: ModelState,
    /// Session data.
    pub session: SessionState,
}

impl SessionSnapshot {
    /// Whether a compare is in flight.
    pub fn comparing(&self) -> bool {
        self.session.phase == Phase::Comparing
    }
}

/// Outcome of [`SessionController::compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOutcome {
    /// Preconditions were not met; nothing happened.
    Skipped,
    /// Ranking finished over this many documents.
    Ranked(usize),
}

/// Coordinates user actions against model readiness.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<EmbeddingService>,
    state: watch::Sender<SessionState>,
    debouncer: Debouncer,
    debounce: Duration,
    next_id: AtomicU64,
}

impl SessionController {
    /// Create a controller with an explicit debounce delay.
    pub fn new(service: Arc<EmbeddingService>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                service,
                state,
                debouncer: Debouncer::new(),
                debounce,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a controller from session settings.
    pub fn from_settings(service: Arc<EmbeddingService>, settings: &SessionSettings) -> Self {
        Self::new(service, Duration::from_millis(settings.debounce_ms))
    }

    /// The shared embedding service.
    pub fn service(&self) -> &Arc<EmbeddingService> {
        &self.inner.service
    }

    /// Consistent copy of everything the presentation layer shows.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            model_state: self.inner.service.state(),
            session: self.inner.state.borrow().clone(),
        }
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Load the model unless it is loading or ready.
    pub async fn request_load(&self) -> Result<()> {
        self.request_load_with(|_| {}).await
    }

    /// Load the model, forwarding progress to `on_progress`.
    pub async fn request_load_with<F>(&self, on_progress: F) -> Result<()>
    where
        F: Fn(&LoadingProgress) + Send + Sync + 'static,
    {
        let model = self.inner.service.state();
        if model.is_loading() || model.is_ready() {
            debug!(state = model.label(), "load request ignored");
            return Ok(());
        }

        self.inner.state.send_modify(|s| s.last_error = None);
        self.inner.service.load(on_progress).await.inspect_err(|e| {
            self.inner
                .state
                .send_modify(|s| s.last_error = Some(format!("Failed to load the model: {e}")));
        })
    }

    /// Append a document and embed it.
    ///
    /// Whitespace is trimmed; empty text, or a model that is not ready,
    /// makes this a no-op returning `Ok(None)`. The document is visible
    /// before its embedding exists. If embedding fails the document stays,
    /// without an embedding, and the error is recorded.
    pub async fn add_document(&self, text: &str) -> Result<Option<DocumentId>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if !self.inner.service.is_ready() {
            debug!("document ignored, model not ready");
            return Ok(None);
        }

        let id = DocumentId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner.state.send_modify(|s| {
            s.documents.push(Document {
                id,
                text: text.to_string(),
                embedding: None,
            });
        });
        debug!(%id, "document added");

        match self.inner.service.embed_document(text).await {
            Ok(embedding) => {
                let attached = self.inner.state.send_if_modified(|s| {
                    match s.documents.iter_mut().find(|d| d.id == id) {
                        Some(doc) => {
                            doc.embedding = Some(embedding);
                            true
                        }
                        None => false,
                    }
                });
                if !attached {
                    debug!(%id, "document removed before its embedding arrived");
                }
                Ok(Some(id))
            }
            Err(e) => {
                warn!(%id, error = %e, "document embedding failed");
                self.inner.state.send_modify(|s| {
                    s.last_error = Some(format!("Could not embed the document: {e}"));
                });
                Err(e)
            }
        }
    }

    /// Remove the document at `index` together with its embedding.
    ///
    /// Out-of-range indices are ignored. Ranked results from an earlier
    /// compare are left as they are.
    pub fn remove_document(&self, index: usize) -> Option<Document> {
        let mut removed = None;
        let _ = self.inner.state.send_if_modified(|s| {
            if index < s.documents.len() {
                removed = Some(s.documents.remove(index));
                true
            } else {
                false
            }
        });
        if let Some(doc) = &removed {
            debug!(id = %doc.id, index, "document removed");
        }
        removed
    }

    /// Replace the query text and schedule a debounced query embedding.
    ///
    /// Any pending embedding is superseded. An empty query, or a model that
    /// is not ready, clears the query embedding instead. Must be called
    /// from within a tokio runtime.
    pub fn set_query(&self, text: &str) {
        let query = text.to_string();
        let live = !query.trim().is_empty() && self.inner.service.is_ready();

        if !live {
            self.inner.debouncer.cancel();
            self.inner.state.send_modify(|s| {
                s.query.clone_from(&query);
                s.query_embedding = None;
            });
            return;
        }

        self.inner.state.send_modify(|s| s.query.clone_from(&query));
        let inner = Arc::clone(&self.inner);
        let _ = self
            .inner
            .debouncer
            .schedule(self.inner.debounce, move |epoch| async move {
                inner.embed_live_query(epoch, query).await;
            });
    }

    /// Embed the query with every document and replace the ranking.
    ///
    /// Runs only when the model is ready, no compare is in flight, the
    /// trimmed query is non-empty and at least one document exists;
    /// otherwise returns [`CompareOutcome::Skipped`]. Embeddings are
    /// written back by document id, so documents removed meanwhile are
    /// skipped. On failure the ranking stays empty and the error is
    /// recorded.
    pub async fn compare(&self) -> Result<CompareOutcome> {
        let ready = self.inner.service.is_ready();
        let mut job = None;
        let _ = self.inner.state.send_if_modified(|s| {
            if !ready
                || s.phase == Phase::Comparing
                || s.query.trim().is_empty()
                || s.documents.is_empty()
            {
                return false;
            }
            s.phase = Phase::Comparing;
            s.ranked_results.clear();
            s.last_error = None;
            let ids: Vec<DocumentId> = s.documents.iter().map(|d| d.id).collect();
            let texts: Vec<String> = s.documents.iter().map(|d| d.text.clone()).collect();
            job = Some((s.query.clone(), ids, texts));
            true
        });
        let Some((query, ids, texts)) = job else {
            debug!("compare skipped");
            return Ok(CompareOutcome::Skipped);
        };

        let mut guard = PhaseGuard {
            state: &self.inner.state,
            armed: true,
        };
        info!(documents = texts.len(), "comparing documents");
        let result = self.inner.service.embed(&query, &texts).await;
        guard.armed = false;

        match result {
            Ok(out) => {
                let ranked = out.ranked_documents.len();
                self.inner.state.send_modify(|s| {
                    for (id, embedding) in ids.iter().zip(out.document_embeddings) {
                        if let Some(doc) = s.documents.iter_mut().find(|d| d.id == *id) {
                            doc.embedding = Some(embedding);
                        }
                    }
                    if s.query == query {
                        s.query_embedding = Some(out.query_embedding);
                    }
                    s.ranked_results = out.ranked_documents;
                    s.phase = Phase::Idle;
                });
                info!(ranked, "compare finished");
                Ok(CompareOutcome::Ranked(ranked))
            }
            Err(e) => {
                warn!(error = %e, "compare failed");
                self.inner.state.send_modify(|s| {
                    s.ranked_results.clear();
                    s.last_error = Some(format!("An error occurred during processing: {e}"));
                    s.phase = Phase::Idle;
                });
                Err(e)
            }
        }
    }
}

impl Inner {
    /// Debounced body of [`SessionController::set_query`].
    async fn embed_live_query(&self, epoch: u64, query: String) {
        match self.service.embed_query(&query).await {
            Ok(embedding) => {
                if !self.debouncer.is_current(epoch) {
                    debug!(epoch, "discarding stale query embedding");
                    return;
                }
                let _ = self.state.send_if_modified(|s| {
                    if s.query == query {
                        s.query_embedding = Some(embedding);
                        true
                    } else {
                        false
                    }
                });
            }
            Err(e) => warn!(error = %e, "query embedding failed"),
        }
    }
}

/// Returns the session to idle if a compare future is dropped midway.
struct PhaseGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(|s| s.phase = Phase::Idle);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sift_embeddings::mock::{MOCK_DIMENSIONS, MockLoader};
    use sift_embeddings::{DOCUMENT_PREFIX, EmbeddingError, HashingGateway, QUERY_PREFIX};

    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn controller() -> (SessionController, Arc<MockLoader>) {
        let loader = Arc::new(MockLoader::default());
        let service = Arc::new(EmbeddingService::new(loader.clone()));
        (SessionController::new(service, DEBOUNCE), loader)
    }

    async fn ready_controller() -> (SessionController, Arc<MockLoader>) {
        let (c, loader) = controller();
        c.request_load().await.unwrap();
        (c, loader)
    }

    fn texts(c: &SessionController) -> Vec<String> {
        c.snapshot()
            .session
            .documents
            .iter()
            .map(|d| d.text.clone())
            .collect()
    }

    fn assert_aligned(c: &SessionController) {
        let snap = c.snapshot();
        assert_eq!(
            snap.session.documents.len(),
            snap.session.document_embeddings().len()
        );
    }

    // ── loading ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn request_load_is_idempotent() {
        let (c, loader) = ready_controller().await;
        c.request_load().await.unwrap();
        assert_eq!(loader.constructions(), 1);
        assert!(c.snapshot().model_state.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn request_load_while_loading_is_noop() {
        let (c, loader) = controller();
        loader.set_delay(Duration::from_millis(50));

        let background = tokio::spawn({
            let c = c.clone();
            async move { c.request_load().await }
        });
        tokio::task::yield_now().await;
        assert!(c.snapshot().model_state.is_loading());

        c.request_load().await.unwrap();
        background.await.unwrap().unwrap();
        assert_eq!(loader.constructions(), 1);
    }

    #[tokio::test]
    async fn failed_load_records_error_and_allows_retry() {
        let (c, loader) = controller();
        loader.fail_next(1);

        assert_matches!(c.request_load().await, Err(EmbeddingError::Initialization(_)));
        let snap = c.snapshot();
        assert_matches!(snap.model_state, ModelState::Failed(_));
        assert!(snap.session.last_error.unwrap().contains("Failed to load"));

        c.request_load().await.unwrap();
        let snap = c.snapshot();
        assert!(snap.model_state.is_ready());
        assert_eq!(snap.session.last_error, None);
        assert_eq!(loader.constructions(), 2);
    }

    // ── documents ───────────────────────────────────────────────────

    #[tokio::test]
    async fn add_before_ready_is_noop() {
        let (c, loader) = controller();
        assert_eq!(c.add_document("hello").await.unwrap(), None);
        assert!(texts(&c).is_empty());
        assert_eq!(loader.gateway().call_count(), 0);
    }

    #[tokio::test]
    async fn add_blank_is_noop() {
        let (c, loader) = ready_controller().await;
        assert_eq!(c.add_document("   \n\t").await.unwrap(), None);
        assert!(texts(&c).is_empty());
        assert_eq!(loader.gateway().call_count(), 0);
    }

    #[tokio::test]
    async fn add_trims_and_embeds() {
        let (c, _loader) = ready_controller().await;
        let id = c.add_document("  The sky is blue.  ").await.unwrap();

        assert!(id.is_some());
        let snap = c.snapshot();
        assert_eq!(snap.session.documents.len(), 1);
        assert_eq!(snap.session.documents[0].text, "The sky is blue.");
        assert_eq!(
            snap.session.documents[0].embedding.as_ref().map(Vec::len),
            Some(MOCK_DIMENSIONS)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn added_document_is_visible_before_embedding() {
        let (c, loader) = ready_controller().await;
        loader.gateway().set_delay(Duration::from_millis(100));

        let pending = tokio::spawn({
            let c = c.clone();
            async move { c.add_document("Paris is in France.").await }
        });
        tokio::task::yield_now().await;

        let snap = c.snapshot();
        assert_eq!(snap.session.documents.len(), 1);
        assert_eq!(snap.session.documents[0].embedding, None);

        pending.await.unwrap().unwrap();
        assert!(c.snapshot().session.documents[0].embedding.is_some());
    }

    #[tokio::test]
    async fn failed_embed_keeps_document() {
        let (c, loader) = ready_controller().await;
        loader.gateway().fail_next(1);

        assert!(c.add_document("Cats are mammals.").await.is_err());

        let snap = c.snapshot();
        assert_eq!(snap.session.documents.len(), 1);
        assert_eq!(snap.session.documents[0].embedding, None);
        assert!(snap.session.last_error.is_some());
        assert_aligned(&c);
    }

    #[tokio::test]
    async fn failed_embed_is_logged() {
        let (logs, _guard) = sift_logging::capture_logs();
        let (c, loader) = ready_controller().await;
        loader.gateway().fail_next(1);

        let _ = c.add_document("Cats are mammals.").await;

        let events = logs.find("document embedding failed");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, tracing::Level::WARN);
        assert!(events[0].field("error").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn late_embedding_for_removed_document_is_dropped() {
        let (c, loader) = ready_controller().await;
        let _ = c.add_document("first").await.unwrap();
        loader.gateway().set_delay(Duration::from_millis(100));

        let pending = tokio::spawn({
            let c = c.clone();
            async move { c.add_document("second").await }
        });
        tokio::task::yield_now().await;
        let removed = c.remove_document(1).unwrap();
        assert_eq!(removed.text, "second");

        pending.await.unwrap().unwrap();
        let snap = c.snapshot();
        assert_eq!(texts(&c), vec!["first".to_string()]);
        assert!(snap.session.documents[0].embedding.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn late_embedding_lands_on_its_own_document() {
        let (c, loader) = ready_controller().await;
        let _ = c.add_document("first").await.unwrap();
        let first_embedding = c.snapshot().session.documents[0].embedding.clone();
        loader.gateway().set_delay(Duration::from_millis(100));

        let pending = tokio::spawn({
            let c = c.clone();
            async move { c.add_document("second").await }
        });
        tokio::task::yield_now().await;
        let _ = c.remove_document(0).unwrap();

        pending.await.unwrap().unwrap();
        let snap = c.snapshot();
        assert_eq!(texts(&c), vec!["second".to_string()]);
        assert!(snap.session.documents[0].embedding.is_some());
        assert_ne!(snap.session.documents[0].embedding, first_embedding);
    }

    #[tokio::test]
    async fn remove_out_of_range_is_none() {
        let (c, _loader) = ready_controller().await;
        let _ = c.add_document("only").await.unwrap();
        assert!(c.remove_document(5).is_none());
        assert_eq!(texts(&c).len(), 1);
    }

    #[tokio::test]
    async fn add_remove_sequence_stays_aligned() {
        let (c, _loader) = ready_controller().await;
        for text in ["a", "b", "c", "d"] {
            let _ = c.add_document(text).await.unwrap();
            assert_aligned(&c);
        }
        let _ = c.remove_document(1);
        assert_aligned(&c);
        let _ = c.remove_document(0);
        let _ = c.add_document("e").await.unwrap();
        assert_aligned(&c);

        assert_eq!(texts(&c), vec!["c".to_string(), "d".to_string(), "e".to_string()]);
        let snap = c.snapshot();
        let reference = sift_embeddings::HashingGateway::new(MOCK_DIMENSIONS).unwrap();
        for doc in &snap.session.documents {
            let expected =
                reference.embed_one(&format!("{}{}", sift_embeddings::DOCUMENT_PREFIX, doc.text));
            assert_eq!(doc.embedding.as_deref(), Some(expected.as_slice()));
        }
    }

    // ── query ───────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_embed_only_latest_query() {
        let (c, loader) = ready_controller().await;

        c.set_query("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        c.set_query("ab");
        tokio::time::sleep(DEBOUNCE * 2).await;

        let calls = loader.gateway().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![format!("{QUERY_PREFIX}ab")]);

        let snap = c.snapshot();
        assert_eq!(snap.session.query, "ab");
        assert!(snap.session.query_embedding.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn query_is_not_embedded_before_quiet_period() {
        let (c, loader) = ready_controller().await;
        c.set_query("sky");
        tokio::time::sleep(DEBOUNCE - Duration::from_millis(10)).await;
        assert_eq!(loader.gateway().call_count(), 0);
        assert_eq!(c.snapshot().session.query, "sky");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_clears_embedding_and_cancels() {
        let (c, loader) = ready_controller().await;
        c.set_query("sky");
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert!(c.snapshot().session.query_embedding.is_some());

        c.set_query("cats");
        c.set_query("   ");
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(loader.gateway().call_count(), 1);
        assert_eq!(c.snapshot().session.query_embedding, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_query_embedding_is_discarded() {
        let (c, loader) = ready_controller().await;
        loader.gateway().set_delay(Duration::from_millis(500));

        c.set_query("sky");
        tokio::time::sleep(DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(loader.gateway().call_count(), 1);

        c.set_query("");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(c.snapshot().session.query_embedding, None);
    }

    #[tokio::test(start_paused = true)]
    async fn query_before_ready_is_not_embedded() {
        let (c, loader) = controller();
        c.set_query("sky");
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(c.snapshot().session.query, "sky");
        assert_eq!(c.snapshot().session.query_embedding, None);
        assert_eq!(loader.gateway().call_count(), 0);
    }

    // ── compare ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn compare_skips_without_query_or_documents() {
        let (c, _loader) = ready_controller().await;
        assert_eq!(c.compare().await.unwrap(), CompareOutcome::Skipped);

        c.set_query("  ");
        let _ = c.add_document("doc").await.unwrap();
        assert_eq!(c.compare().await.unwrap(), CompareOutcome::Skipped);
    }

    #[tokio::test]
    async fn compare_skips_before_ready() {
        let (c, _loader) = controller();
        c.set_query("sky");
        assert_eq!(c.compare().await.unwrap(), CompareOutcome::Skipped);
    }

    #[tokio::test]
    async fn compare_ranks_and_refreshes_embeddings() {
        let (c, loader) = ready_controller().await;
        for text in ["The sky is blue.", "Paris is in France.", "Cats are mammals."] {
            let _ = c.add_document(text).await.unwrap();
        }
        c.set_query("What color is the sky?");

        let before = loader.gateway().call_count();
        assert_eq!(c.compare().await.unwrap(), CompareOutcome::Ranked(3));
        assert_eq!(loader.gateway().call_count(), before + 1);

        let snap = c.snapshot();
        assert!(!snap.comparing());
        assert_eq!(snap.session.ranked_results.len(), 3);
        assert_eq!(snap.session.ranked_results[0].text, "The sky is blue.");
        assert!(snap.session.query_embedding.is_some());
        assert!(snap.session.documents.iter().all(|d| d.embedding.is_some()));
        assert_eq!(snap.session.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn second_compare_while_comparing_is_skipped() {
        let (c, loader) = ready_controller().await;
        let _ = c.add_document("doc").await.unwrap();
        c.set_query("query");
        loader.gateway().set_delay(Duration::from_millis(100));

        let first = tokio::spawn({
            let c = c.clone();
            async move { c.compare().await }
        });
        tokio::task::yield_now().await;
        assert!(c.snapshot().comparing());

        assert_eq!(c.compare().await.unwrap(), CompareOutcome::Skipped);
        assert_eq!(first.await.unwrap().unwrap(), CompareOutcome::Ranked(1));
        assert!(!c.snapshot().comparing());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_and_add_during_compare_keep_alignment() {
        let (c, loader) = ready_controller().await;
        for text in ["alpha", "beta", "gamma"] {
            let _ = c.add_document(text).await.unwrap();
        }
        c.set_query("beta");
        loader.gateway().set_delay(Duration::from_millis(100));

        let running = tokio::spawn({
            let c = c.clone();
            async move { c.compare().await }
        });
        tokio::task::yield_now().await;
        assert!(c.snapshot().comparing());

        let removed = c.remove_document(0).unwrap();
        assert_eq!(removed.text, "alpha");
        let added = c.add_document("delta").await.unwrap();
        assert!(added.is_some());

        assert_eq!(running.await.unwrap().unwrap(), CompareOutcome::Ranked(3));

        let snap = c.snapshot();
        assert!(!snap.comparing());
        assert_eq!(texts(&c), vec!["beta", "gamma", "delta"]);
        assert_aligned(&c);

        let reference = HashingGateway::new(MOCK_DIMENSIONS).unwrap();
        for doc in &snap.session.documents {
            let expected = reference.embed_one(&format!("{DOCUMENT_PREFIX}{}", doc.text));
            assert_eq!(doc.embedding.as_deref(), Some(expected.as_slice()), "{}", doc.text);
        }

        // Results describe the documents as they were when the compare began.
        let ranked = &snap.session.ranked_results;
        assert_eq!(ranked.len(), 3);
        for (text, index) in [("alpha", 0), ("beta", 1), ("gamma", 2)] {
            let hit = ranked.iter().find(|r| r.text == text).unwrap();
            assert_eq!(hit.original_index, index);
        }
        assert!(ranked.iter().all(|r| r.text != "delta"));
    }

    #[tokio::test]
    async fn compare_failure_records_error() {
        let (c, loader) = ready_controller().await;
        let _ = c.add_document("doc").await.unwrap();
        c.set_query("query");
        assert_eq!(c.compare().await.unwrap(), CompareOutcome::Ranked(1));

        loader.gateway().fail_next(1);
        assert!(c.compare().await.is_err());

        let snap = c.snapshot();
        assert!(!snap.comparing());
        assert!(snap.session.ranked_results.is_empty());
        assert!(
            snap.session
                .last_error
                .unwrap()
                .contains("An error occurred during processing")
        );
        assert!(snap.session.documents[0].embedding.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_compare_returns_to_idle() {
        let (c, loader) = ready_controller().await;
        let _ = c.add_document("doc").await.unwrap();
        c.set_query("query");
        loader.gateway().set_delay(Duration::from_millis(100));

        let attempt = tokio::time::timeout(Duration::from_millis(10), c.compare()).await;
        assert!(attempt.is_err());
        assert!(!c.snapshot().comparing());
    }

    #[tokio::test]
    async fn subscribers_are_notified() {
        let (c, _loader) = ready_controller().await;
        let mut rx = c.subscribe();
        let _ = rx.borrow_and_update();

        let _ = c.add_document("hello").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().documents.len(), 1);
    }

    #[test]
    fn document_id_display() {
        assert_eq!(DocumentId(7).to_string(), "doc-7");
    }
}
