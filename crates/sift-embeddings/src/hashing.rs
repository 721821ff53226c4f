//! Feature-hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed with SHA-256 into one of
//! `dimensions` buckets with a hash-derived sign, then the vector is
//! L2-normalized. Similarity reflects shared vocabulary only, but the
//! output is deterministic and needs no model files, so it serves as the
//! offline backend and as the backend under test.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{EmbeddingError, Result};
use crate::gateway::{GatewayLoader, LoadingProgress, LoadingStatus, ModelGateway, ProgressSink};
use crate::normalize::l2_normalize;

const MODEL_ID: &str = "sift/feature-hashing";

/// Deterministic bag-of-words embedder.
#[derive(Clone, Debug)]
pub struct HashingGateway {
    dimensions: usize,
}

impl HashingGateway {
    /// Create an embedder with the given output width.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(EmbeddingError::Config(
                "hashing dimensions must be at least 1".into(),
            ));
        }
        Ok(Self { dimensions })
    }

    /// Output width.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            #[allow(clippy::cast_possible_truncation)]
            let idx = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

/// Lower-cased runs of alphanumeric characters.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl ModelGateway for HashingGateway {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }
}

/// Loader for [`HashingGateway`]. Construction is instant.
#[derive(Clone, Debug)]
pub struct HashingLoader {
    gateway: HashingGateway,
}

impl HashingLoader {
    /// Validate `dimensions` and prepare the loader.
    pub fn new(dimensions: usize) -> Result<Self> {
        Ok(Self {
            gateway: HashingGateway::new(dimensions)?,
        })
    }
}

#[async_trait]
impl GatewayLoader for HashingLoader {
    async fn load(&self, progress: ProgressSink) -> Result<Arc<dyn ModelGateway>> {
        debug!(dimensions = self.gateway.dimensions, "hashing gateway ready");
        progress(LoadingProgress::new(LoadingStatus::Ready, MODEL_ID, 100.0));
        Ok(Arc::new(self.gateway.clone()))
    }
}
