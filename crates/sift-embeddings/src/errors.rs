//! Embedding error types.
//!
//! Every variant carries plain strings so errors can be cloned and handed
//! to each caller waiting on the same model load.

use thiserror::Error;

/// Errors from embedding operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    /// Model or tokenizer failed to load. Retrying the load is allowed.
    #[error("Model initialization failed: {0}")]
    Initialization(String),

    /// Embedding was requested before the model reached the ready state.
    #[error("Embedding service not ready")]
    NotReady,

    /// A single inference call failed or returned malformed output.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;
