//! `sift rank`: load, rank once, print JSON.

use anyhow::{Context, Result};
use sift_embeddings::EmbeddingService;

/// Rank `docs` against `query` and return the ranking as pretty JSON.
///
/// Load progress goes to stderr so stdout stays machine-readable.
pub async fn rank_json(service: &EmbeddingService, query: &str, docs: &[String]) -> Result<String> {
    service
        .load(|p| eprintln!("{p}"))
        .await
        .context("Failed to load the embedding model")?;
    let out = service
        .embed(query, docs)
        .await
        .context("Failed to rank documents")?;
    serde_json::to_string_pretty(&out.ranked_documents).context("Failed to encode ranking")
}
