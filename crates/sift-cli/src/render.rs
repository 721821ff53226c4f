//! Plain-text views of a session snapshot.

use std::fmt::Write;

use sift_embeddings::{ModelState, RankedDocument};
use sift_session::SessionSnapshot;

const PREVIEW_COMPONENTS: usize = 4;

/// First few components of a vector, e.g. `[0.120, -0.031, …] (384d)`.
pub fn vector_preview(v: &[f32]) -> String {
    let head: Vec<String> = v
        .iter()
        .take(PREVIEW_COMPONENTS)
        .map(|x| format!("{x:.3}"))
        .collect();
    let ellipsis = if v.len() > PREVIEW_COMPONENTS { ", …" } else { "" };
    format!("[{}{ellipsis}] ({}d)", head.join(", "), v.len())
}

/// Numbered document list with embedding status.
pub fn documents(snapshot: &SessionSnapshot) -> String {
    let docs = &snapshot.session.documents;
    if docs.is_empty() {
        return "no documents".to_string();
    }
    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        let status = match &doc.embedding {
            Some(v) => vector_preview(v),
            None => "(not embedded)".to_string(),
        };
        let _ = writeln!(out, "{:>3}. {}  {status}", i + 1, doc.text);
    }
    out.truncate(out.trim_end().len());
    out
}

/// Ranked results, best first.
///
/// Documents are shown by text only; `original_index` counts positions at
/// compare time, which later removals shift.
pub fn results(ranked: &[RankedDocument]) -> String {
    if ranked.is_empty() {
        return "no results".to_string();
    }
    let mut out = String::new();
    for (rank, doc) in ranked.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {:+.4}  {}",
            rank + 1,
            doc.score,
            doc.text
        );
    }
    out.truncate(out.trim_end().len());
    out
}

/// One-line model status.
pub fn model(state: &ModelState) -> String {
    match state {
        ModelState::Loading(Some(progress)) => format!("loading ({progress})"),
        ModelState::Failed(reason) => format!("failed ({reason})"),
        other => other.label().to_string(),
    }
}

/// Model and session summary.
pub fn state(snapshot: &SessionSnapshot) -> String {
    let session = &snapshot.session;
    let query = match &session.query_embedding {
        Some(v) => format!("{:?} {}", session.query, vector_preview(v)),
        None => format!("{:?} (not embedded)", session.query),
    };
    let mut out = format!(
        "model: {}\nquery: {query}\ndocuments: {}\nresults: {}\ncomparing: {}",
        model(&snapshot.model_state),
        session.documents.len(),
        session.ranked_results.len(),
        if snapshot.comparing() { "yes" } else { "no" },
    );
    if let Some(error) = &session.last_error {
        let _ = write!(out, "\nerror: {error}");
    }
    out
}

#[cfg(test)]
mod tests {
    use sift_embeddings::{LoadingProgress, LoadingStatus};
    use sift_session::SessionState;

    use super::*;

    fn snapshot(model_state: ModelState, session: SessionState) -> SessionSnapshot {
        SessionSnapshot {
            model_state,
            session,
        }
    }

    #[test]
    fn preview_truncates_long_vectors() {
        assert_eq!(
            vector_preview(&[0.5, -0.25, 0.125, 1.0, 0.0]),
            "[0.500, -0.250, 0.125, 1.000, …] (5d)"
        );
        assert_eq!(vector_preview(&[1.0]), "[1.000] (1d)");
    }

    #[test]
    fn empty_views() {
        let snap = snapshot(ModelState::Unloaded, SessionState::default());
        assert_eq!(documents(&snap), "no documents");
        assert_eq!(results(&[]), "no results");
    }

    #[test]
    fn results_are_numbered_by_rank_only() {
        let ranked = vec![
            RankedDocument {
                original_index: 2,
                text: "The sky is blue.".into(),
                score: 0.5,
            },
            RankedDocument {
                original_index: 0,
                text: "Cats are mammals.".into(),
                score: -0.125,
            },
        ];
        assert_eq!(
            results(&ranked),
            "  1. +0.5000  The sky is blue.\n  2. -0.1250  Cats are mammals."
        );
    }

    #[test]
    fn loading_model_shows_progress() {
        let progress = LoadingProgress::new(LoadingStatus::Progress, "onnx/model_q4.onnx", 12.4);
        assert_eq!(
            model(&ModelState::Loading(Some(progress))),
            "loading (progress: onnx/model_q4.onnx (12%))"
        );
        assert_eq!(model(&ModelState::Ready), "ready");
    }

    #[test]
    fn state_includes_error() {
        let session = SessionState {
            query: "sky".into(),
            last_error: Some("Could not embed the document".into()),
            ..SessionState::default()
        };
        let text = state(&snapshot(ModelState::Ready, session));
        assert!(text.contains("model: ready"));
        assert!(text.contains("query: \"sky\" (not embedded)"));
        assert!(text.ends_with("error: Could not embed the document"));
    }
}
