//! Cosine ranking of candidate vectors against a query vector.

use serde::Serialize;

use crate::errors::{EmbeddingError, Result};
use crate::normalize::cosine_similarity;

/// A document with its similarity to the query.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDocument {
    /// Position of the document in the input list.
    pub original_index: usize,
    /// Document text as supplied (without any model prefix).
    pub text: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Score every candidate against `query` and sort by score, highest first.
///
/// `candidates[i]` must belong to `texts[i]`. The sort is stable, so equal
/// scores keep their input order. Output length always equals input length.
/// Mismatched lengths or widths and non-finite components are errors.
pub fn rank(query: &[f32], candidates: &[Vec<f32>], texts: &[String]) -> Result<Vec<RankedDocument>> {
    if candidates.len() != texts.len() {
        return Err(EmbeddingError::Inference(format!(
            "{} embeddings for {} documents",
            candidates.len(),
            texts.len()
        )));
    }
    if let Some((i, c)) = candidates
        .iter()
        .enumerate()
        .find(|(_, c)| c.len() != query.len())
    {
        return Err(EmbeddingError::Inference(format!(
            "document {i} has dimension {}, query has {}",
            c.len(),
            query.len()
        )));
    }

    if query.iter().chain(candidates.iter().flatten()).any(|x| !x.is_finite()) {
        return Err(EmbeddingError::Inference(
            "embeddings contain non-finite components".into(),
        ));
    }

    let mut ranked: Vec<RankedDocument> = candidates
        .iter()
        .zip(texts)
        .enumerate()
        .map(|(original_index, (embedding, text))| RankedDocument {
            original_index,
            text: text.clone(),
            score: cosine_similarity(query, embedding),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(ranked)
}
