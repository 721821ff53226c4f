//! Embedding configuration.

use serde::{Deserialize, Serialize};
use sift_settings::{EmbeddingBackend, EmbeddingSettings, expand_home};

/// Configuration for the embedding backends.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    /// Which gateway to construct.
    pub backend: EmbeddingBackend,
    /// Hugging Face model repository.
    pub model: String,
    /// Quantization dtype.
    pub dtype: String,
    /// Local model cache directory (may contain `~`).
    pub cache_dir: String,
    /// Tokens per input before truncation.
    pub max_length: usize,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
    /// Output width of the hashing backend.
    pub hashing_dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_settings(&EmbeddingSettings::default())
    }
}

impl EmbeddingConfig {
    /// Create config from settings.
    pub fn from_settings(s: &EmbeddingSettings) -> Self {
        Self {
            backend: s.backend,
            model: s.model.clone(),
            dtype: s.dtype.clone(),
            cache_dir: s.cache_dir.clone(),
            max_length: s.max_length,
            intra_threads: s.intra_threads,
            hashing_dimensions: s.hashing_dimensions,
        }
    }

    /// Config for the offline hashing backend.
    pub fn hashing(dimensions: usize) -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            hashing_dimensions: dimensions,
            ..Self::default()
        }
    }

    /// Resolve the cache directory, expanding `~/` to the home directory.
    pub fn resolved_cache_dir(&self) -> String {
        expand_home(&self.cache_dir)
    }

    /// Path of the ONNX weights inside the model repository.
    pub fn model_file(&self) -> String {
        format!("onnx/model_{}.onnx", self.dtype)
    }
}
