//! The model capability: given texts, return one vector per text.
//!
//! [`ModelGateway`] is the only seam the rest of the crate sees. Backends
//! are constructed through a [`GatewayLoader`], which may report progress
//! while it downloads and prepares model files.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sift_settings::EmbeddingBackend;

use crate::config::EmbeddingConfig;
use crate::errors::Result;
use crate::hashing::HashingLoader;

/// A loaded embedding model.
///
/// Contract: exactly one vector per input, in input order; every vector has
/// the same width; identical input yields identical output for the same
/// model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Embed a batch of texts.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the underlying model, for logs.
    fn model_id(&self) -> &str;
}

/// Builds a [`ModelGateway`], reporting progress along the way.
#[async_trait]
pub trait GatewayLoader: Send + Sync {
    /// Construct the gateway. May take a long time (downloads, session setup).
    async fn load(&self, progress: ProgressSink) -> Result<Arc<dyn ModelGateway>>;
}

/// Callback receiving loading progress updates.
pub type ProgressSink = Arc<dyn Fn(LoadingProgress) + Send + Sync>;

/// Phase of a model file while loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStatus {
    /// A file is about to be fetched.
    Initiate,
    /// Download has started.
    Download,
    /// Download is under way.
    Progress,
    /// A file finished downloading or was found in the cache.
    Done,
    /// The model is assembled and usable.
    Ready,
}

impl LoadingStatus {
    /// Lowercase name used in progress lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiate => "initiate",
            Self::Download => "download",
            Self::Progress => "progress",
            Self::Done => "done",
            Self::Ready => "ready",
        }
    }
}

/// One progress update emitted during model loading.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadingProgress {
    /// Current phase.
    pub status: LoadingStatus,
    /// File the update refers to.
    pub file: String,
    /// Completion in `[0, 100]`.
    pub progress: f32,
}

impl LoadingProgress {
    /// Build an update, clamping `progress` into `[0, 100]`.
    pub fn new(status: LoadingStatus, file: impl Into<String>, progress: f32) -> Self {
        Self {
            status,
            file: file.into(),
            progress: progress.clamp(0.0, 100.0),
        }
    }

    /// Completion rounded to a whole percent.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        self.progress.clamp(0.0, 100.0).round() as u8
    }
}

impl fmt::Display for LoadingProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({}%)",
            self.status.as_str(),
            self.file,
            self.percent()
        )
    }
}

/// Pick the loader for the configured backend.
pub fn loader_for(config: &EmbeddingConfig) -> Result<Arc<dyn GatewayLoader>> {
    match config.backend {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingLoader::new(config.hashing_dimensions)?)),
        #[cfg(feature = "ort")]
        EmbeddingBackend::Onnx => Ok(Arc::new(crate::ort_gateway::OnnxLoader::new(
            config.clone(),
        ))),
        #[cfg(not(feature = "ort"))]
        EmbeddingBackend::Onnx => Err(crate::errors::EmbeddingError::Config(
            "onnx backend requires the `ort` feature; use the hashing backend instead".into(),
        )),
    }
}
