//! # sift-embeddings
//!
//! Semantic ranking of short documents against a query.
//!
//! - [`normalize`]: norms, dot product, cosine similarity
//! - [`gateway`]: the [`ModelGateway`] capability and its loaders
//! - [`service`]: model lifecycle and prefixed, batched embedding
//! - [`ranking`]: stable cosine ranking
//!
//! Two backends are provided: an ONNX Runtime gateway running
//! `onnx-community/embeddinggemma-300m-ONNX` (behind the `ort` feature),
//! and a deterministic feature-hashing gateway that needs no model files.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod gateway;
pub mod hashing;
pub mod mock;
pub mod normalize;
#[cfg(feature = "ort")]
pub mod ort_gateway;
pub mod ranking;
pub mod service;

pub use config::EmbeddingConfig;
pub use errors::{EmbeddingError, Result};
pub use gateway::{
    GatewayLoader, LoadingProgress, LoadingStatus, ModelGateway, ProgressSink, loader_for,
};
pub use hashing::{HashingGateway, HashingLoader};
pub use ranking::{RankedDocument, rank};
pub use service::{DOCUMENT_PREFIX, EmbedOutput, EmbeddingService, ModelState, QUERY_PREFIX};
